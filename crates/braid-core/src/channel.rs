//! Logical channels.
//!
//! A channel is one numbered substream multiplexed over the transport. The
//! engine owns the channel table and drives status transitions; user code
//! holds cheap clones of the [`Channel`] handle and interacts through its
//! listener sets and `send`.
//!
//! Channels hold no reference back to the engine, only an injected message
//! sink, so dropping the client never leaks channels and a channel can
//! outlive its engine (sends then fail with [`ChannelError::Detached`]).

use std::sync::{Arc, Mutex, PoisonError};

use braid_proto::Message;
use serde_json::{Map, Value};

use crate::error::ChannelError;
use crate::listener::{ListenerId, ListenerSet};

/// Lifecycle status of a channel.
///
/// `Closed` is terminal: a closed channel is never reopened, a fresh channel
/// with a fresh id must be created instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// `CHANNEL_REQUEST` pending (or queued until the connection is ready).
    Requested,
    /// The server confirmed the channel; payload may flow.
    Opened,
    /// The channel is closed for good.
    Closed,
}

/// A status transition delivered to status listeners.
///
/// Transitions where the status did not actually change are suppressed, so
/// `status != previous` always holds here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// The status the channel just entered.
    pub status: ChannelStatus,
    /// The status it left.
    pub previous: ChannelStatus,
}

/// A channel-scoped error reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelErrorEvent {
    /// Server-defined error tag.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

/// Sink the engine injects for outbound channel traffic.
pub(crate) type MessageSink = Arc<dyn Fn(Message) -> Result<(), ChannelError> + Send + Sync>;

struct Shared {
    id: u64,
    service: String,
    parameters: Map<String, Value>,
    status: Mutex<ChannelStatus>,
    message_listeners: ListenerSet<Message>,
    status_listeners: ListenerSet<StatusChange>,
    error_listeners: ListenerSet<ChannelErrorEvent>,
    sink: MessageSink,
}

/// Handle to one logical channel.
#[derive(Clone)]
pub struct Channel {
    shared: Arc<Shared>,
}

impl Channel {
    pub(crate) fn new(
        id: u64,
        service: impl Into<String>,
        parameters: Map<String, Value>,
        sink: MessageSink,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                service: service.into(),
                parameters,
                status: Mutex::new(ChannelStatus::Requested),
                message_listeners: ListenerSet::new(),
                status_listeners: ListenerSet::new(),
                error_listeners: ListenerSet::new(),
                sink,
            }),
        }
    }

    /// Channel id; odd for client-initiated channels, unique per client.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Service name the channel was opened for.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.shared.service
    }

    /// Parameters the channel was opened with.
    #[must_use]
    pub fn parameters(&self) -> &Map<String, Value> {
        &self.shared.parameters
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        *self.lock_status()
    }

    /// Sends a payload message on this channel.
    ///
    /// The message is re-routed to this channel's id before submission.
    ///
    /// # Errors
    ///
    /// Fails with [`ChannelError::NotReady`] unless the channel is `Opened`.
    pub fn send(&self, message: Message) -> Result<(), ChannelError> {
        let status = self.status();
        if status != ChannelStatus::Opened {
            return Err(ChannelError::NotReady { status });
        }
        (self.shared.sink)(message.with_channel(self.shared.id))
    }

    /// Sends a channel-scoped `ERROR` to the server.
    ///
    /// # Errors
    ///
    /// Fails with [`ChannelError::NotReady`] once the channel is closed.
    pub fn error(&self, kind: &str, message: &str) -> Result<(), ChannelError> {
        let status = self.status();
        if status == ChannelStatus::Closed {
            return Err(ChannelError::NotReady { status });
        }
        (self.shared.sink)(Message::error(self.shared.id, kind, message))
    }

    /// Closes the channel: sends `CHANNEL_CANCEL`, notifies status
    /// listeners of the final transition, and clears all listener sets.
    ///
    /// Closing an already-closed channel is a no-op.
    pub fn close(&self) {
        let previous = {
            let mut status = self.lock_status();
            if *status == ChannelStatus::Closed {
                return;
            }
            std::mem::replace(&mut *status, ChannelStatus::Closed)
        };
        if let Err(e) = (self.shared.sink)(Message::channel_cancel(self.shared.id)) {
            tracing::debug!(channel = self.shared.id, error = %e, "channel cancel not sent");
        }
        self.shared.status_listeners.notify(&StatusChange { status: ChannelStatus::Closed, previous });
        self.clear_listeners();
    }

    /// Registers a payload-message listener.
    pub fn add_message_listener(&self, f: impl Fn(&Message) + Send + Sync + 'static) -> ListenerId {
        self.shared.message_listeners.add(f)
    }

    /// Removes a payload-message listener.
    pub fn remove_message_listener(&self, id: ListenerId) {
        self.shared.message_listeners.remove(id);
    }

    /// Registers a status listener; invoked with every real transition.
    pub fn add_status_listener(
        &self,
        f: impl Fn(&StatusChange) + Send + Sync + 'static,
    ) -> ListenerId {
        self.shared.status_listeners.add(f)
    }

    /// Removes a status listener.
    pub fn remove_status_listener(&self, id: ListenerId) {
        self.shared.status_listeners.remove(id);
    }

    /// Registers a listener for channel-scoped server errors.
    pub fn add_error_listener(
        &self,
        f: impl Fn(&ChannelErrorEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.shared.error_listeners.add(f)
    }

    /// Removes an error listener.
    pub fn remove_error_listener(&self, id: ListenerId) {
        self.shared.error_listeners.remove(id);
    }

    // ---- engine-facing ---------------------------------------------------

    pub(crate) fn process_status_opened(&self) {
        self.transition(ChannelStatus::Opened);
    }

    pub(crate) fn process_status_requested(&self) {
        self.transition(ChannelStatus::Requested);
    }

    pub(crate) fn process_status_closed(&self) {
        if self.transition(ChannelStatus::Closed) {
            self.clear_listeners();
        }
    }

    pub(crate) fn process_payload(&self, message: &Message) {
        self.shared.message_listeners.notify(message);
    }

    pub(crate) fn process_error(&self, kind: String, message: String) {
        if self.shared.error_listeners.is_empty() {
            tracing::error!(
                channel = self.shared.id,
                error = %kind,
                message = %message,
                "unhandled channel error"
            );
            return;
        }
        self.shared.error_listeners.notify(&ChannelErrorEvent { kind, message });
    }

    /// Applies a status transition; `Closed` is terminal and equal-status
    /// transitions are suppressed. Returns whether a transition happened.
    fn transition(&self, next: ChannelStatus) -> bool {
        let previous = {
            let mut status = self.lock_status();
            if *status == next || *status == ChannelStatus::Closed {
                return false;
            }
            std::mem::replace(&mut *status, next)
        };
        self.shared.status_listeners.notify(&StatusChange { status: next, previous });
        true
    }

    fn clear_listeners(&self) {
        self.shared.message_listeners.clear();
        self.shared.status_listeners.clear();
        self.shared.error_listeners.clear();
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, ChannelStatus> {
        self.shared.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.shared.id)
            .field("service", &self.shared.service)
            .field("status", &self.status())
            .finish()
    }
}
