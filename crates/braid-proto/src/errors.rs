//! Protocol error types.

use thiserror::Error;

/// Errors produced while building or interpreting protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A required field is absent or has the wrong JSON type.
    #[error("field `{field}` missing or malformed in `{kind}` message")]
    MissingField {
        /// Message type tag the field belongs to.
        kind: String,
        /// Name of the offending field.
        field: String,
    },

    /// The `state` field of an `AUTH_STATE` message is not a known value.
    #[error("unrecognized auth state `{value}`")]
    UnknownAuthState {
        /// The value found on the wire.
        value: String,
    },

    /// The message is not a valid JSON object of the expected shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Convenience result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
