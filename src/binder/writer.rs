//! Result writing.
//!
//! # Responsibilities
//! - Define [`Reply`]: a single handler return value and its kind
//! - Define [`Replies`]: everything a handler may return (nothing, one
//!   value, a tuple, or a `Result` of those)
//! - Write slots to the response in order
//!
//! # Write Rules
//! ```text
//! Status   → set status, continue
//! Headers  → merge headers, continue
//! Body     → write, stop
//! Stream   → copy until EOF, stop
//! Template → render with the next slot's data, stop
//! Encoded  → encode (binary / text / serializer), write, stop
//! ```

use std::fmt;

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use super::codec::{Encode, Serialized};
use super::error::{Fault, WriteError};
use super::resolver::BodyReader;
use super::signature::{Capability, ReplyKind};
use super::template::Template;
use crate::http::ResponseWriter;
use crate::serialization::Serializer;

/// A reply value ready to be written.
pub enum Slot {
    Status(u16),
    Headers(HeaderMap),
    Body(Bytes),
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    Template(Template),
    Encoded(Box<dyn Encode>),
}

impl Slot {
    pub fn kind(&self) -> ReplyKind {
        match self {
            Slot::Status(_) => ReplyKind::Status,
            Slot::Headers(_) => ReplyKind::Headers,
            Slot::Body(_) => ReplyKind::Body,
            Slot::Stream(_) => ReplyKind::Stream,
            Slot::Template(_) => ReplyKind::Template,
            Slot::Encoded(value) => ReplyKind::Encoded(value.capability()),
        }
    }

    /// Data for a template that precedes this slot.
    fn template_context(&self) -> minijinja::Value {
        match self {
            Slot::Status(code) => minijinja::Value::from(*code),
            Slot::Body(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => minijinja::Value::from(text),
                Err(_) => minijinja::Value::from_bytes(bytes.to_vec()),
            },
            Slot::Encoded(value) => value.template_context(),
            Slot::Headers(_) | Slot::Stream(_) | Slot::Template(_) => minijinja::Value::UNDEFINED,
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Status(code) => f.debug_tuple("Status").field(code).finish(),
            Slot::Headers(headers) => f.debug_tuple("Headers").field(headers).finish(),
            Slot::Body(bytes) => f.debug_tuple("Body").field(&bytes.len()).finish(),
            Slot::Stream(_) => f.write_str("Stream"),
            Slot::Template(t) => f.debug_tuple("Template").field(&t.name()).finish(),
            Slot::Encoded(value) => f.debug_tuple("Encoded").field(&value.capability()).finish(),
        }
    }
}

/// A single handler return value.
pub trait Reply: Send + 'static {
    const KIND: ReplyKind;

    fn into_slot(self) -> Slot;
}

impl Reply for StatusCode {
    const KIND: ReplyKind = ReplyKind::Status;

    fn into_slot(self) -> Slot {
        Slot::Status(self.as_u16())
    }
}

impl Reply for u16 {
    const KIND: ReplyKind = ReplyKind::Status;

    fn into_slot(self) -> Slot {
        Slot::Status(self)
    }
}

impl Reply for HeaderMap {
    const KIND: ReplyKind = ReplyKind::Headers;

    fn into_slot(self) -> Slot {
        Slot::Headers(self)
    }
}

impl Reply for String {
    const KIND: ReplyKind = ReplyKind::Body;

    fn into_slot(self) -> Slot {
        Slot::Body(Bytes::from(self))
    }
}

impl Reply for &'static str {
    const KIND: ReplyKind = ReplyKind::Body;

    fn into_slot(self) -> Slot {
        Slot::Body(Bytes::from_static(self.as_bytes()))
    }
}

impl Reply for Vec<u8> {
    const KIND: ReplyKind = ReplyKind::Body;

    fn into_slot(self) -> Slot {
        Slot::Body(Bytes::from(self))
    }
}

impl Reply for Bytes {
    const KIND: ReplyKind = ReplyKind::Body;

    fn into_slot(self) -> Slot {
        Slot::Body(self)
    }
}

impl Reply for Template {
    const KIND: ReplyKind = ReplyKind::Template;

    fn into_slot(self) -> Slot {
        Slot::Template(self)
    }
}

/// Echoing a request body streams it straight back.
impl Reply for BodyReader {
    const KIND: ReplyKind = ReplyKind::Stream;

    fn into_slot(self) -> Slot {
        Slot::Stream(Box::new(self))
    }
}

impl Reply for serde_json::Value {
    const KIND: ReplyKind = ReplyKind::Encoded(Capability::Serializer);

    fn into_slot(self) -> Slot {
        Slot::Encoded(Box::new(Serialized(self)))
    }
}

/// Any async reader, copied into the response body until EOF.
pub struct Reader(Box<dyn AsyncRead + Send + Unpin>);

impl Reader {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self(Box::new(reader))
    }
}

impl Reply for Reader {
    const KIND: ReplyKind = ReplyKind::Stream;

    fn into_slot(self) -> Slot {
        Slot::Stream(self.0)
    }
}

/// Everything a handler may return.
pub trait Replies: Send + 'static {
    fn kinds() -> Vec<ReplyKind>;

    fn into_slots(self) -> Result<Vec<Slot>, Fault>;
}

impl Replies for () {
    fn kinds() -> Vec<ReplyKind> {
        Vec::new()
    }

    fn into_slots(self) -> Result<Vec<Slot>, Fault> {
        Ok(Vec::new())
    }
}

impl<T: Reply> Replies for T {
    fn kinds() -> Vec<ReplyKind> {
        vec![T::KIND]
    }

    fn into_slots(self) -> Result<Vec<Slot>, Fault> {
        Ok(vec![self.into_slot()])
    }
}

/// An `Err` aborts the request before anything is written.
impl<T, E> Replies for Result<T, E>
where
    T: Replies,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    fn kinds() -> Vec<ReplyKind> {
        T::kinds()
    }

    fn into_slots(self) -> Result<Vec<Slot>, Fault> {
        match self {
            Ok(value) => value.into_slots(),
            Err(err) => Err(Fault::Handler(err.into())),
        }
    }
}

macro_rules! impl_replies_tuple {
    ($($ty:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($ty: Reply,)+> Replies for ($($ty,)+) {
            fn kinds() -> Vec<ReplyKind> {
                vec![$($ty::KIND,)+]
            }

            fn into_slots(self) -> Result<Vec<Slot>, Fault> {
                let ($($ty,)+) = self;
                Ok(vec![$($ty.into_slot(),)+])
            }
        }
    };
}

impl_replies_tuple!(T1, T2);
impl_replies_tuple!(T1, T2, T3);
impl_replies_tuple!(T1, T2, T3, T4);
impl_replies_tuple!(T1, T2, T3, T4, T5);
impl_replies_tuple!(T1, T2, T3, T4, T5, T6);
impl_replies_tuple!(T1, T2, T3, T4, T5, T6, T7);
impl_replies_tuple!(T1, T2, T3, T4, T5, T6, T7, T8);

/// Write reply slots to the response.
pub async fn write_replies(
    slots: Vec<Slot>,
    writer: &ResponseWriter,
    serializer: &dyn Serializer,
) -> Result<(), WriteError> {
    let mut slots = slots.into_iter();
    while let Some(slot) = slots.next() {
        match slot {
            Slot::Status(code) => {
                let status = StatusCode::from_u16(code).map_err(|_| WriteError::InvalidStatus(code))?;
                writer.set_status(status);
            }
            Slot::Headers(headers) => writer.merge_headers(headers),
            Slot::Body(bytes) => {
                writer.write(bytes).await?;
                return Ok(());
            }
            Slot::Stream(reader) => {
                copy_stream(reader, writer).await?;
                return Ok(());
            }
            Slot::Template(template) => {
                let data = slots.next().ok_or(WriteError::MissingTemplateData)?;
                let rendered = template.render(data.template_context())?;
                writer.write(rendered).await?;
                return Ok(());
            }
            Slot::Encoded(value) => {
                let body = value.encode(serializer)?;
                if value.capability() == Capability::Serializer {
                    if let Some(content_type) = serializer.content_type() {
                        writer.default_content_type(content_type);
                    }
                }
                writer.write(body).await?;
                return Ok(());
            }
        }
    }
    Ok(())
}

async fn copy_stream(reader: Box<dyn AsyncRead + Send + Unpin>, writer: &ResponseWriter) -> Result<(), WriteError> {
    let mut chunks = ReaderStream::new(reader);
    while let Some(chunk) = chunks.next().await {
        writer.write(chunk.map_err(WriteError::Stream)?).await?;
    }
    Ok(())
}
