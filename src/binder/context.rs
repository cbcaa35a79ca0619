//! Per-request state available to parameter binding.

use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, Method, Uri};
use bytes::Bytes;
use http_body_util::LengthLimitError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::BindError;
use crate::http::ResponseWriter;
use crate::serialization::Serializer;

/// Header carrying the request id set by the server middleware.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Everything a handler parameter can be bound from.
pub struct RequestContext {
    parts: Parts,
    body: Option<Body>,
    vars: HashMap<String, String>,
    writer: ResponseWriter,
    token: CancellationToken,
    deadline: Option<Instant>,
    serializer: Arc<dyn Serializer>,
}

impl RequestContext {
    pub(crate) fn new(
        parts: Parts,
        body: Body,
        vars: HashMap<String, String>,
        writer: ResponseWriter,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        Self {
            parts,
            body: Some(body),
            vars,
            writer,
            token: CancellationToken::new(),
            deadline: None,
            serializer,
        }
    }

    pub(crate) fn with_cancellation(mut self, token: CancellationToken, deadline: Option<Instant>) -> Self {
        self.token = token;
        self.deadline = deadline;
        self
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn path_vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    pub fn serializer(&self) -> &dyn Serializer {
        self.serializer.as_ref()
    }

    /// Take the body stream. Later callers get an empty body.
    pub fn take_body(&mut self) -> Body {
        self.body.take().unwrap_or_else(Body::empty)
    }

    /// Read the remaining body into memory.
    ///
    /// A streamed body cut off by the server's body limit is reported as
    /// [`BindError::TooLarge`].
    pub async fn drain_body(&mut self) -> Result<Bytes, BindError> {
        let body = self.take_body();
        axum::body::to_bytes(body, usize::MAX).await.map_err(|e| {
            if exceeds_length_limit(&e) {
                BindError::TooLarge
            } else {
                BindError::Body(e)
            }
        })
    }

    /// Snapshot of the request-scoped context.
    pub fn context(&self) -> Context {
        Context {
            extensions: self.parts.extensions.clone(),
            token: self.token.clone(),
            deadline: self.deadline,
            remote_addr: self
                .parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0),
            request_id: self
                .parts
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

fn exceeds_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Request-scoped values, deadline and cancellation.
///
/// Values placed in request extensions by middleware are visible through
/// [`Context::value`].
#[derive(Debug, Clone)]
pub struct Context {
    extensions: Extensions,
    token: CancellationToken,
    deadline: Option<Instant>,
    remote_addr: Option<SocketAddr>,
    request_id: Option<String>,
}

impl Context {
    /// A value inserted into the request extensions upstream.
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the request timed out or the client went away.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the request is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

/// Variables captured from the path and query templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVars(HashMap<String, String>);

impl PathVars {
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self(vars)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn into_inner(self) -> HashMap<String, String> {
        self.0
    }
}

impl Deref for PathVars {
    type Target = HashMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Query parameters, all values per key in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(HashMap<String, Vec<String>>);

impl Query {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut params: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(raw) = raw {
            for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
                params.entry(key.into_owned()).or_default().push(value.into_owned());
            }
        }
        Self(params)
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_inner(self) -> HashMap<String, Vec<String>> {
        self.0
    }
}

impl Deref for Query {
    type Target = HashMap<String, Vec<String>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::JsonSerializer;

    #[test]
    fn test_query_parse() {
        let query = Query::parse(Some("a=1&b=x%20y&a=2&flag"));
        assert_eq!(query.get("a"), Some("1"));
        assert_eq!(query.get_all("a"), ["1", "2"]);
        assert_eq!(query.get("b"), Some("x y"));
        assert_eq!(query.get("flag"), Some(""));
        assert!(query.get_all("missing").is_empty());
        assert!(Query::parse(None).is_empty());
    }

    #[test]
    fn test_path_vars() {
        let vars = PathVars::new(HashMap::from([("id".to_string(), "7".to_string())]));
        assert_eq!(vars.get("id"), Some("7"));
        assert_eq!(vars["id"], "7");
        assert_eq!(vars.len(), 1);
    }

    fn context_with_body(body: Body) -> RequestContext {
        let (parts, ()) = axum::http::Request::new(()).into_parts();
        let (writer, _head) = ResponseWriter::channel(1);
        RequestContext::new(parts, body, HashMap::new(), writer, Arc::new(JsonSerializer))
    }

    #[tokio::test]
    async fn test_drain_body_over_limit() {
        let limited = http_body_util::Limited::new(Body::from(vec![b'x'; 64]), 16);
        let mut cx = context_with_body(Body::new(limited));
        assert!(matches!(cx.drain_body().await, Err(BindError::TooLarge)));

        // second read sees an empty body
        assert!(cx.drain_body().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drain_body_within_limit() {
        let limited = http_body_util::Limited::new(Body::from("small"), 16);
        let mut cx = context_with_body(Body::new(limited));
        assert_eq!(cx.drain_body().await.unwrap(), "small");
    }
}
