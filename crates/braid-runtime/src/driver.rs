//! Event sources feeding the runtime loop.

use std::future::Future;

use braid_proto::Message;
use tokio::sync::mpsc;

/// A transport adapter event, mirroring the adapter callback surface.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The socket session is open.
    Opened,
    /// A decoded message arrived.
    Message(Message),
    /// The socket session closed.
    Closed,
}

/// Source of transport events for a [`crate::Runtime`].
///
/// Implementations wrap whatever the platform transport produces (a
/// WebSocket read half, a test script) and surface events in the order the
/// socket produced them. Returning `None` ends the runtime loop.
pub trait EventSource: Send {
    /// Waits for the next event. `None` means the source is exhausted and
    /// the runtime should shut down.
    fn next_event(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;
}

/// Event source over an unbounded tokio mpsc channel.
///
/// The sending half lives in the transport adapter (or a test); dropping it
/// terminates the runtime loop.
pub struct MpscEventSource {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl MpscEventSource {
    /// Creates a connected sender/source pair.
    #[must_use]
    pub fn channel() -> (mpsc::UnboundedSender<TransportEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

impl EventSource for MpscEventSource {
    fn next_event(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send {
        self.rx.recv()
    }
}
