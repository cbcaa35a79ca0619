//! Parameter binding.
//!
//! # Responsibilities
//! - Define [`Param`]: a type that can be produced from a [`RequestContext`]
//! - Provide the built-in kinds (context, writer, request, headers, body
//!   as reader / bytes / text, path variables, query)
//! - Decode application types through binary, text or serializer codecs
//!
//! # Design Decisions
//! - Parameters bind left to right; the first body consumer takes the body
//!   and any later one sees an empty body
//! - Decoding failures abort the request, they never reach the handler

use std::collections::HashMap;
use std::future::{ready, Future};
use std::io;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::StreamReader;

use super::codec::{DecodeBinary, DecodeText};
use super::context::{Context, PathVars, Query, RequestContext};
use super::error::BindError;
use super::signature::{Capability, ParamKind};
use crate::http::ResponseWriter;
use crate::serialization;

/// A handler parameter.
pub trait Param: Sized + Send + 'static {
    const KIND: ParamKind;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a;
}

impl Param for Context {
    const KIND: ParamKind = ParamKind::Context;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        ready(Ok(cx.context()))
    }
}

impl Param for ResponseWriter {
    const KIND: ParamKind = ParamKind::ResponseWriter;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        ready(Ok(cx.writer().clone()))
    }
}

/// The full request, rebuilt from its head and the untaken body.
impl Param for Request<Body> {
    const KIND: ParamKind = ParamKind::Request;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        let parts = cx.parts();
        let mut builder = Request::builder()
            .method(parts.method.clone())
            .uri(parts.uri.clone())
            .version(parts.version);
        if let Some(headers) = builder.headers_mut() {
            *headers = parts.headers.clone();
        }
        if let Some(extensions) = builder.extensions_mut() {
            *extensions = parts.extensions.clone();
        }
        let request = builder.body(cx.take_body());
        ready(request.map_err(|e| BindError::Body(axum::Error::new(e))))
    }
}

impl Param for HeaderMap {
    const KIND: ParamKind = ParamKind::Headers;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        ready(Ok(cx.headers().clone()))
    }
}

impl Param for BodyReader {
    const KIND: ParamKind = ParamKind::Reader;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        ready(Ok(BodyReader::new(cx.take_body())))
    }
}

impl Param for Bytes {
    const KIND: ParamKind = ParamKind::Bytes;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        cx.drain_body()
    }
}

impl Param for Vec<u8> {
    const KIND: ParamKind = ParamKind::Bytes;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        async move { Ok(cx.drain_body().await?.to_vec()) }
    }
}

impl Param for String {
    const KIND: ParamKind = ParamKind::Text;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        async move {
            let bytes = cx.drain_body().await?;
            Ok(String::from_utf8(bytes.to_vec())?)
        }
    }
}

impl Param for PathVars {
    const KIND: ParamKind = ParamKind::PathVars;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        ready(Ok(PathVars::new(cx.path_vars().clone())))
    }
}

impl Param for HashMap<String, String> {
    const KIND: ParamKind = ParamKind::PathVars;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        ready(Ok(cx.path_vars().clone()))
    }
}

impl Param for Query {
    const KIND: ParamKind = ParamKind::Query;

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        ready(Ok(Query::parse(cx.uri().query())))
    }
}

/// Untyped body through the registered serializer.
impl Param for serde_json::Value {
    const KIND: ParamKind = ParamKind::Body(Capability::Serializer);

    fn bind<'a>(cx: &'a mut RequestContext) -> impl Future<Output = Result<Self, BindError>> + Send + 'a {
        async move {
            let bytes = cx.drain_body().await?;
            Ok(cx.serializer().deserialize(&bytes)?)
        }
    }
}

/// Decode the body with [`DecodeBinary`].
pub async fn decode_binary<T: DecodeBinary>(cx: &mut RequestContext) -> Result<T, BindError> {
    let bytes = cx.drain_body().await?;
    T::decode_binary(&bytes).map_err(|source| BindError::Decode {
        capability: Capability::Binary,
        source,
    })
}

/// Decode the body with [`DecodeText`]. The body must be UTF-8.
pub async fn decode_text<T: DecodeText>(cx: &mut RequestContext) -> Result<T, BindError> {
    let bytes = cx.drain_body().await?;
    let text = String::from_utf8(bytes.to_vec())?;
    T::decode_text(&text).map_err(|source| BindError::Decode {
        capability: Capability::Text,
        source,
    })
}

/// Decode the body with the registered serializer.
pub async fn decode_serialized<T: DeserializeOwned>(cx: &mut RequestContext) -> Result<T, BindError> {
    let bytes = cx.drain_body().await?;
    Ok(serialization::from_bytes(cx.serializer(), &bytes)?)
}

/// A streaming reader over the request body.
///
/// Dropping it releases the body.
pub struct BodyReader {
    inner: StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>,
}

impl BodyReader {
    pub fn new(body: Body) -> Self {
        let stream = body.into_data_stream().map_err(io::Error::other).boxed();
        Self {
            inner: StreamReader::new(stream),
        }
    }
}

impl AsyncRead for BodyReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl std::fmt::Debug for BodyReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyReader").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::JsonSerializer;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    fn context(uri: &str, body: &'static str) -> RequestContext {
        let (parts, body) = Request::builder()
            .uri(uri)
            .header("content-type", "text/plain")
            .body(Body::from(body))
            .unwrap()
            .into_parts();
        let (writer, _head) = ResponseWriter::channel(1);
        let vars = HashMap::from([("id".to_string(), "42".to_string())]);
        RequestContext::new(parts, body, vars, writer, Arc::new(JsonSerializer))
    }

    #[tokio::test]
    async fn test_bind_text_then_bytes() {
        let mut cx = context("/", "hello");
        assert_eq!(String::bind(&mut cx).await.unwrap(), "hello");
        // body already consumed
        assert!(Bytes::bind(&mut cx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bind_invalid_utf8() {
        let (parts, body) = Request::builder()
            .body(Body::from(vec![0xff, 0xfe]))
            .unwrap()
            .into_parts();
        let (writer, _head) = ResponseWriter::channel(1);
        let mut cx = RequestContext::new(parts, body, HashMap::new(), writer, Arc::new(JsonSerializer));
        assert!(matches!(String::bind(&mut cx).await, Err(BindError::InvalidText(_))));
    }

    #[tokio::test]
    async fn test_bind_head_values() {
        let mut cx = context("/items/42?page=2&page=3", "");
        let vars = PathVars::bind(&mut cx).await.unwrap();
        assert_eq!(vars.get("id"), Some("42"));

        let query = Query::bind(&mut cx).await.unwrap();
        assert_eq!(query.get("page"), Some("2"));

        let headers = HeaderMap::bind(&mut cx).await.unwrap();
        assert_eq!(headers["content-type"], "text/plain");
    }

    #[tokio::test]
    async fn test_bind_reader() {
        let mut cx = context("/", "streamed body");
        let mut reader = BodyReader::bind(&mut cx).await.unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "streamed body");
    }

    #[tokio::test]
    async fn test_bind_request_keeps_head_and_body() {
        let mut cx = context("/r?x=1", "payload");
        let request = Request::<Body>::bind(&mut cx).await.unwrap();
        assert_eq!(request.uri().query(), Some("x=1"));
        assert_eq!(request.headers()["content-type"], "text/plain");
        let body = axum::body::to_bytes(request.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, "payload");
    }

    #[tokio::test]
    async fn test_bind_serialized_value() {
        let mut cx = context("/", r#"{"a":[1,2]}"#);
        let value = serde_json::Value::bind(&mut cx).await.unwrap();
        assert_eq!(value, serde_json::json!({"a": [1, 2]}));

        let mut cx = context("/", "{");
        assert!(matches!(
            serde_json::Value::bind(&mut cx).await,
            Err(BindError::Serializer(_))
        ));
    }
}
