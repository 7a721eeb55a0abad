//! Transport adapter contract.
//!
//! The engine is transport-agnostic: a WebSocket driver, a TCP framer, or
//! the harness's scripted transport all plug in behind this trait. The
//! adapter owns sockets, framing, and JSON encode/decode; the engine owns
//! the protocol.
//!
//! # Callback contract
//!
//! The adapter delivers its events by calling [`crate::Client::transport_opened`],
//! [`crate::Client::transport_message`], and [`crate::Client::transport_closed`]
//! on the owning client, in the order the underlying socket produced them.
//! After [`Transport::stop`] returns, the adapter must not deliver further
//! callbacks for that socket; a later [`Transport::start`] begins a fresh
//! socket session on the same url (the engine restarts a stopped transport
//! when reconnecting). The adapter does not retry at the protocol level:
//! a lost socket is reported as a single close event.
//!
//! Callbacks must come from the adapter's own delivery context, never
//! synchronously from inside `start`, `stop`, or `send`; the engine invokes
//! those while holding its state lock.

use braid_proto::Message;
use thiserror::Error;

/// Failure handing a message to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The socket is not currently open.
    #[error("transport is not open")]
    NotOpen,

    /// The underlying driver failed to send.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// One transport connection to a fixed url.
pub trait Transport: Send {
    /// Begins (or restarts) the socket session.
    fn start(&mut self);

    /// Tears the socket session down. No callbacks may be delivered after
    /// this returns.
    fn stop(&mut self);

    /// Submits a message for delivery in submission order.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the socket cannot accept the
    /// message; the engine treats this as a degraded-but-alive transport
    /// and leaves recovery to the close/liveness machinery.
    fn send(&mut self, message: &Message) -> Result<(), TransportError>;

    /// The url this transport was created for.
    fn url(&self) -> &str;
}

/// Factory producing a transport for a url, injected at client construction.
pub type TransportFactory = Box<dyn Fn(&str) -> Box<dyn Transport> + Send>;
