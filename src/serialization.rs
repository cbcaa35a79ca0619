//! Pluggable body serialization.
//!
//! # Responsibilities
//! - Define the [`Serializer`] contract used for request bodies and
//!   response values that have no binary/text codec of their own
//! - Provide the default JSON implementation
//!
//! # Design Decisions
//! - The contract is object-safe and works on `serde_json::Value`, so any
//!   format able to express a JSON data model can be plugged in at runtime
//! - Typed conversion happens once in [`to_bytes`] / [`from_bytes`]
//! - Field order of structs is preserved (`preserve_order`)

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Registry id under which the active serializer is stored.
///
/// The component stored here must be an `Arc<dyn Serializer>`. Use
/// [`Registry::register_serializer`](crate::registry::Registry::register_serializer)
/// to swap it, or register an `Arc<dyn Serializer>` under this id yourself.
/// A concrete serializer type registered here directly fails route
/// compilation with a type mismatch.
pub const SERIALIZER_ID: &str = "responseSerializer";

/// Serialization failures.
#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("failed to encode value: {0}")]
    Encode(String),

    #[error("failed to decode value: {0}")]
    Decode(String),
}

/// A body format.
pub trait Serializer: Send + Sync {
    /// Media type written alongside encoded bodies, if any.
    fn content_type(&self) -> Option<&'static str> {
        None
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SerializerError>;

    fn deserialize(&self, data: &[u8]) -> Result<Value, SerializerError>;
}

/// Compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn content_type(&self) -> Option<&'static str> {
        Some("application/json")
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SerializerError> {
        serde_json::to_vec(value).map_err(|e| SerializerError::Encode(e.to_string()))
    }

    fn deserialize(&self, data: &[u8]) -> Result<Value, SerializerError> {
        serde_json::from_slice(data).map_err(|e| SerializerError::Decode(e.to_string()))
    }
}

/// Encode any serde value with the given serializer.
pub fn to_bytes<T: Serialize + ?Sized>(
    serializer: &dyn Serializer,
    value: &T,
) -> Result<Vec<u8>, SerializerError> {
    let value = serde_json::to_value(value).map_err(|e| SerializerError::Encode(e.to_string()))?;
    serializer.serialize(&value)
}

/// Decode any serde value with the given serializer.
pub fn from_bytes<T: DeserializeOwned>(
    serializer: &dyn Serializer,
    data: &[u8],
) -> Result<T, SerializerError> {
    let value = serializer.deserialize(data)?;
    serde_json::from_value(value).map_err(|e| SerializerError::Decode(e.to_string()))
}
