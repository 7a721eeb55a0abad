//! Engine error types.

use std::time::Duration;

use thiserror::Error;

use crate::channel::ChannelStatus;

/// Connection-level failures surfaced through error listeners and the
/// `connect` completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The server did not answer within the action budget.
    #[error("{operation} response not received within {waited:?}")]
    Timeout {
        /// The awaited exchange (`SETUP` or `AUTH_STATE`).
        operation: String,
        /// How long the engine waited.
        waited: Duration,
    },

    /// A send was attempted with no live transport.
    #[error("no active transport")]
    NotConnected,

    /// The transport reported a failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server reported a connection-scoped error.
    #[error("server error [{kind}]: {message}")]
    Server {
        /// Server-defined error tag.
        kind: String,
        /// Human-readable description.
        message: String,
    },

    /// The connection was torn down before reaching `Connected`.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Channel-scoped failures returned synchronously to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel is not in the `Opened` status required for sending.
    #[error("channel is not open (status: {status:?})")]
    NotReady {
        /// Status the channel was in at the time of the call.
        status: ChannelStatus,
    },

    /// The owning client has been dropped.
    #[error("channel is detached from its client")]
    Detached,

    /// The engine could not hand the message to the transport.
    #[error("send failed: {0}")]
    Send(String),
}
