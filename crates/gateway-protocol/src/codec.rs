//! JSON codec for REST bodies.
//!
//! The transport hands around `serde_json::Value`; these helpers convert to
//! and from typed messages and name the endpoint in the error.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A request body could not be serialized.
    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A response body did not match the expected message type.
    #[error("Unexpected {what} response: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Serialize a request body.
pub fn encode<T: Serialize + ?Sized>(what: &'static str, msg: &T) -> Result<Value, CodecError> {
    serde_json::to_value(msg).map_err(|source| CodecError::Encode { what, source })
}

/// Deserialize a response body already parsed as JSON.
pub fn decode_value<T: DeserializeOwned>(what: &'static str, value: Value) -> Result<T, CodecError> {
    serde_json::from_value(value).map_err(|source| CodecError::Decode { what, source })
}

/// Deserialize a response body from text.
pub fn decode<T: DeserializeOwned>(what: &'static str, text: &str) -> Result<T, CodecError> {
    serde_json::from_str(text).map_err(|source| CodecError::Decode { what, source })
}
