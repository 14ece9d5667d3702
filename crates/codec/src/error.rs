//! Codec error types

use thiserror::Error;

/// Encoding or decoding failure
#[derive(Debug, Error)]
pub enum CodecError {
    /// Textual form could not be (de)serialized
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary form could not be decoded
    #[error("protobuf error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// Payload decoded but a field holds an unusable value
    #[error("invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    /// Marshaler name not recognised
    #[error("unknown marshaler '{0}', expected 'json' or 'protobuf'")]
    UnknownMarshaler(String),
}

impl CodecError {
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}
