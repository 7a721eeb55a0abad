//! Message classification.
//!
//! Routing is decided by two fields only: `channel` splits connection-level
//! from channel-level traffic, and within a channel the `type` tag splits
//! lifecycle messages from opaque payload.

use crate::message::{tags, Message, CONNECTION_CHANNEL};

/// Connection-level message kinds (channel 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Setup handshake.
    Setup,
    /// Authorization state announcement.
    AuthState,
    /// Token submission (client-to-server; inbound occurrences are ignored).
    Auth,
    /// Liveness signal.
    Keepalive,
    /// Connection-scoped error.
    Error,
    /// A type tag the core does not recognize on channel 0.
    Unrecognized,
}

/// Channel lifecycle message kinds (channel != 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    /// Request to open the channel.
    ChannelRequest,
    /// The channel is open.
    ChannelOpened,
    /// Request to close the channel.
    ChannelCancel,
    /// The channel is closed.
    ChannelClosed,
    /// Channel-scoped error.
    Error,
}

/// Top-level classification of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Connection-level message on the reserved channel 0.
    Connection(ConnectionKind),
    /// Lifecycle message for a logical channel.
    Lifecycle(LifecycleKind),
    /// Opaque payload for a logical channel.
    Payload,
}

/// Classifies a message per the protocol taxonomy.
#[must_use]
pub fn classify(message: &Message) -> MessageClass {
    if message.channel() == CONNECTION_CHANNEL {
        let kind = match message.kind() {
            tags::SETUP => ConnectionKind::Setup,
            tags::AUTH_STATE => ConnectionKind::AuthState,
            tags::AUTH => ConnectionKind::Auth,
            tags::KEEPALIVE => ConnectionKind::Keepalive,
            tags::ERROR => ConnectionKind::Error,
            _ => ConnectionKind::Unrecognized,
        };
        return MessageClass::Connection(kind);
    }

    match message.kind() {
        tags::CHANNEL_REQUEST => MessageClass::Lifecycle(LifecycleKind::ChannelRequest),
        tags::CHANNEL_OPENED => MessageClass::Lifecycle(LifecycleKind::ChannelOpened),
        tags::CHANNEL_CANCEL => MessageClass::Lifecycle(LifecycleKind::ChannelCancel),
        tags::CHANNEL_CLOSED => MessageClass::Lifecycle(LifecycleKind::ChannelClosed),
        tags::ERROR => MessageClass::Lifecycle(LifecycleKind::Error),
        _ => MessageClass::Payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_zero_is_connection_level() {
        assert_eq!(
            Message::keepalive().class(),
            MessageClass::Connection(ConnectionKind::Keepalive)
        );
        assert_eq!(
            Message::new("SETUP", 0).class(),
            MessageClass::Connection(ConnectionKind::Setup)
        );
        assert_eq!(
            Message::new("SOMETHING_ELSE", 0).class(),
            MessageClass::Connection(ConnectionKind::Unrecognized)
        );
    }

    #[test]
    fn nonzero_channel_splits_lifecycle_from_payload() {
        assert_eq!(
            Message::new("CHANNEL_OPENED", 1).class(),
            MessageClass::Lifecycle(LifecycleKind::ChannelOpened)
        );
        assert_eq!(
            Message::error(1, "BAD", "nope").class(),
            MessageClass::Lifecycle(LifecycleKind::Error)
        );
        assert_eq!(Message::new("FEED_DATA", 1).class(), MessageClass::Payload);
    }

    #[test]
    fn error_on_channel_zero_is_connection_scoped() {
        assert_eq!(
            Message::error(0, "TIMEOUT", "x").class(),
            MessageClass::Connection(ConnectionKind::Error)
        );
    }
}
