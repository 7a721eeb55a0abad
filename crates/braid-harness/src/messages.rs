//! Server-side message constructors for tests and scenarios.

use std::time::Duration;

use braid_core::{AuthState, Message};
use braid_proto::message::tags;

/// Server half of the `SETUP` handshake.
#[must_use]
pub fn server_setup(version: &str, keepalive: Duration) -> Message {
    Message::new(tags::SETUP, 0)
        .with_field("version", version)
        .with_field("keepaliveTimeout", keepalive.as_secs_f64())
}

/// Server `AUTH_STATE` announcement.
#[must_use]
pub fn auth_state(state: AuthState) -> Message {
    let value = serde_json::to_value(state).unwrap_or_default();
    Message::new(tags::AUTH_STATE, 0).with_field("state", value)
}

/// Server confirmation that a channel is open.
#[must_use]
pub fn channel_opened(channel: u64, service: &str) -> Message {
    Message::new(tags::CHANNEL_OPENED, channel).with_field("service", service)
}

/// Server notification that a channel is closed.
#[must_use]
pub fn channel_closed(channel: u64) -> Message {
    Message::new(tags::CHANNEL_CLOSED, channel)
}
