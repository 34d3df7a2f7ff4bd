//! Error types for protocol messages.

use qcsync_codec::CodecError;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building or reading wire messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The text could not be encoded or parsed at all.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The text parsed but does not have the expected shape.
    #[error("malformed message: {message}")]
    Shape {
        /// What was wrong with the message.
        message: String,
    },

    /// A timestamp could not be understood.
    #[error("invalid watermark: {text:?}")]
    InvalidWatermark {
        /// The offending text.
        text: String,
    },
}

impl ProtocolError {
    /// Creates a shape error.
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape {
            message: message.into(),
        }
    }
}
