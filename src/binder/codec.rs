//! Body codecs for application types.
//!
//! A type that is not one of the built-in parameter or reply kinds opts in
//! with [`payload!`](crate::payload), choosing how its body is decoded and
//! how it is encoded when returned:
//!
//! ```ignore
//! payload!(Order);                                   // registered serializer both ways
//! payload!(Frame => binary);                         // DecodeBinary + EncodeBinary
//! payload!(Token, decode = text, encode = binary);   // mix capabilities
//! payload!(Ack, decode = none, encode = serializer); // reply only
//! ```

use std::error::Error as StdError;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use super::error::WriteError;
use super::signature::Capability;
use crate::serialization::{self, Serializer};

/// Failure reported by an application codec.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CodecError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Construct a value from raw body bytes.
pub trait DecodeBinary: Sized {
    fn decode_binary(data: &[u8]) -> Result<Self, CodecError>;
}

/// Construct a value from the body read as UTF-8 text.
pub trait DecodeText: Sized {
    fn decode_text(text: &str) -> Result<Self, CodecError>;
}

/// Produce raw body bytes.
pub trait EncodeBinary {
    fn encode_binary(&self) -> Result<Vec<u8>, CodecError>;
}

/// Produce body text.
pub trait EncodeText {
    fn encode_text(&self) -> Result<String, CodecError>;
}

/// A reply value that still needs encoding.
pub trait Encode: Send {
    fn capability(&self) -> Capability;

    fn encode(&self, serializer: &dyn Serializer) -> Result<Bytes, WriteError>;

    /// Data exposed to a template when this value follows one.
    fn template_context(&self) -> minijinja::Value;
}

/// Encodes through [`EncodeBinary`].
pub struct BinaryEncoded<T>(pub T);

impl<T: EncodeBinary + Send> Encode for BinaryEncoded<T> {
    fn capability(&self) -> Capability {
        Capability::Binary
    }

    fn encode(&self, _serializer: &dyn Serializer) -> Result<Bytes, WriteError> {
        self.0
            .encode_binary()
            .map(Bytes::from)
            .map_err(|source| WriteError::Encode {
                capability: Capability::Binary,
                source,
            })
    }

    fn template_context(&self) -> minijinja::Value {
        self.0
            .encode_binary()
            .map(minijinja::Value::from_bytes)
            .unwrap_or(minijinja::Value::UNDEFINED)
    }
}

/// Encodes through [`EncodeText`].
pub struct TextEncoded<T>(pub T);

impl<T: EncodeText + Send> Encode for TextEncoded<T> {
    fn capability(&self) -> Capability {
        Capability::Text
    }

    fn encode(&self, _serializer: &dyn Serializer) -> Result<Bytes, WriteError> {
        self.0
            .encode_text()
            .map(Bytes::from)
            .map_err(|source| WriteError::Encode {
                capability: Capability::Text,
                source,
            })
    }

    fn template_context(&self) -> minijinja::Value {
        self.0
            .encode_text()
            .map(minijinja::Value::from)
            .unwrap_or(minijinja::Value::UNDEFINED)
    }
}

/// Encodes through the registered serializer.
pub struct Serialized<T>(pub T);

impl<T: Serialize + Send> Encode for Serialized<T> {
    fn capability(&self) -> Capability {
        Capability::Serializer
    }

    fn encode(&self, serializer: &dyn Serializer) -> Result<Bytes, WriteError> {
        Ok(Bytes::from(serialization::to_bytes(serializer, &self.0)?))
    }

    fn template_context(&self) -> minijinja::Value {
        minijinja::Value::from_serialize(&self.0)
    }
}

/// Give an application type a body codec.
///
/// Implements [`Param`](crate::binder::Param) and/or
/// [`Reply`](crate::binder::Reply) for the type. Capabilities are `binary`,
/// `text`, `serializer`, or `none` to skip a direction.
#[macro_export]
macro_rules! payload {
    ($ty:ty) => {
        $crate::payload!($ty, decode = serializer, encode = serializer);
    };
    ($ty:ty => $capability:ident) => {
        $crate::payload!($ty, decode = $capability, encode = $capability);
    };
    ($ty:ty, decode = $decode:ident, encode = $encode:ident) => {
        $crate::__payload_param!($decode, $ty);
        $crate::__payload_reply!($encode, $ty);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __payload_param {
    (none, $ty:ty) => {};
    (binary, $ty:ty) => {
        $crate::__payload_param!(@impl $ty, Binary, decode_binary);
    };
    (text, $ty:ty) => {
        $crate::__payload_param!(@impl $ty, Text, decode_text);
    };
    (serializer, $ty:ty) => {
        $crate::__payload_param!(@impl $ty, Serializer, decode_serialized);
    };
    (@impl $ty:ty, $capability:ident, $decode:ident) => {
        impl $crate::binder::Param for $ty {
            const KIND: $crate::binder::ParamKind =
                $crate::binder::ParamKind::Body($crate::binder::Capability::$capability);

            fn bind<'a>(
                cx: &'a mut $crate::binder::RequestContext,
            ) -> impl ::std::future::Future<
                Output = ::std::result::Result<Self, $crate::binder::BindError>,
            > + Send
                   + 'a {
                $crate::binder::resolver::$decode::<Self>(cx)
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __payload_reply {
    (none, $ty:ty) => {};
    (binary, $ty:ty) => {
        $crate::__payload_reply!(@impl $ty, Binary, BinaryEncoded);
    };
    (text, $ty:ty) => {
        $crate::__payload_reply!(@impl $ty, Text, TextEncoded);
    };
    (serializer, $ty:ty) => {
        $crate::__payload_reply!(@impl $ty, Serializer, Serialized);
    };
    (@impl $ty:ty, $capability:ident, $wrapper:ident) => {
        impl $crate::binder::Reply for $ty {
            const KIND: $crate::binder::ReplyKind =
                $crate::binder::ReplyKind::Encoded($crate::binder::Capability::$capability);

            fn into_slot(self) -> $crate::binder::Slot {
                $crate::binder::Slot::Encoded(::std::boxed::Box::new(
                    $crate::binder::codec::$wrapper(self),
                ))
            }
        }
    };
}
