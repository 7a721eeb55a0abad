//! The logical message: a `type` tag, a `channel` number, and an open body.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ProtocolError, Result};
use crate::taxonomy::{classify, MessageClass};

/// Reserved channel id for connection-level protocol messages.
pub const CONNECTION_CHANNEL: u64 = 0;

/// Protocol version advertised in the `SETUP` handshake.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Client implementation version, combined with [`PROTOCOL_VERSION`] into
/// the `SETUP` version string as `"<protocol>-<client>"`.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the full version string carried in an outbound `SETUP`.
#[must_use]
pub fn setup_version() -> String {
    format!("{PROTOCOL_VERSION}-{CLIENT_VERSION}")
}

/// Authorization state as signalled by the server in `AUTH_STATE` messages.
///
/// The same three values form the client-side authorization state machine,
/// so the type does double duty as wire value and engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    /// No authorization for the current transport session.
    Unauthorized,
    /// A token has been submitted and is being validated.
    Authorizing,
    /// The server accepted the submitted token.
    Authorized,
}

/// A single protocol message.
///
/// Everything beyond the two routing fields lives in [`Message::body`], a
/// flattened JSON object. Payload messages (any type the core does not
/// recognize) round-trip through the engine untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    channel: u64,
    #[serde(flatten)]
    body: Map<String, Value>,
}

impl Message {
    /// Creates a message with an empty body.
    pub fn new(kind: impl Into<String>, channel: u64) -> Self {
        Self { kind: kind.into(), channel, body: Map::new() }
    }

    /// Creates a payload message with the given body.
    pub fn payload(kind: impl Into<String>, channel: u64, body: Map<String, Value>) -> Self {
        Self { kind: kind.into(), channel, body }
    }

    /// Message type tag.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Channel the message is routed to. 0 is the connection channel.
    #[must_use]
    pub fn channel(&self) -> u64 {
        self.channel
    }

    /// Per-type fields beyond `type` and `channel`.
    #[must_use]
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Returns the message re-routed to the given channel.
    #[must_use]
    pub fn with_channel(mut self, channel: u64) -> Self {
        self.channel = channel;
        self
    }

    /// Classifies the message per the protocol taxonomy.
    #[must_use]
    pub fn class(&self) -> MessageClass {
        classify(self)
    }

    /// Sets a body field, consuming and returning the message.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(name.into(), value.into());
        self
    }

    /// Looks up a body field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    // ---- outbound constructors -------------------------------------------

    /// Builds the client half of the `SETUP` handshake.
    pub fn setup(version: &str, keepalive_timeout: Duration, accept_keepalive_timeout: Duration) -> Self {
        Self::new(tags::SETUP, CONNECTION_CHANNEL)
            .with_field("version", version)
            .with_field("keepaliveTimeout", keepalive_timeout.as_secs())
            .with_field("acceptKeepaliveTimeout", accept_keepalive_timeout.as_secs())
    }

    /// Builds an `AUTH` token submission.
    pub fn auth(token: &str) -> Self {
        Self::new(tags::AUTH, CONNECTION_CHANNEL).with_field("token", token)
    }

    /// Builds a `KEEPALIVE` liveness signal.
    pub fn keepalive() -> Self {
        Self::new(tags::KEEPALIVE, CONNECTION_CHANNEL)
    }

    /// Builds an `ERROR` message on the given channel.
    pub fn error(channel: u64, kind: &str, message: &str) -> Self {
        Self::new(tags::ERROR, channel).with_field("error", kind).with_field("message", message)
    }

    /// Builds a `CHANNEL_REQUEST` opening a logical channel.
    pub fn channel_request(channel: u64, service: &str, parameters: Map<String, Value>) -> Self {
        Self::new(tags::CHANNEL_REQUEST, channel)
            .with_field("service", service)
            .with_field("parameters", Value::Object(parameters))
    }

    /// Builds a `CHANNEL_CANCEL` closing a logical channel.
    pub fn channel_cancel(channel: u64) -> Self {
        Self::new(tags::CHANNEL_CANCEL, channel)
    }

    // ---- inbound accessors -----------------------------------------------

    /// `version` field of a `SETUP` message.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.field("version").and_then(Value::as_str)
    }

    /// `keepaliveTimeout` field of a `SETUP` message, in seconds on the wire.
    #[must_use]
    pub fn keepalive_timeout(&self) -> Option<Duration> {
        self.field("keepaliveTimeout").and_then(Value::as_f64).map(Duration::from_secs_f64)
    }

    /// `state` field of an `AUTH_STATE` message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingField`] when absent and
    /// [`ProtocolError::UnknownAuthState`] for unrecognized values.
    pub fn auth_state(&self) -> Result<AuthState> {
        let value = self.field("state").and_then(Value::as_str).ok_or_else(|| {
            ProtocolError::MissingField { kind: self.kind.clone(), field: "state".into() }
        })?;
        match value {
            "UNAUTHORIZED" => Ok(AuthState::Unauthorized),
            "AUTHORIZING" => Ok(AuthState::Authorizing),
            "AUTHORIZED" => Ok(AuthState::Authorized),
            other => Err(ProtocolError::UnknownAuthState { value: other.into() }),
        }
    }

    /// `error` and `message` fields of an `ERROR` message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingField`] when either field is absent.
    pub fn error_details(&self) -> Result<(String, String)> {
        let kind = self.field("error").and_then(Value::as_str).ok_or_else(|| {
            ProtocolError::MissingField { kind: self.kind.clone(), field: "error".into() }
        })?;
        let message = self.field("message").and_then(Value::as_str).ok_or_else(|| {
            ProtocolError::MissingField { kind: self.kind.clone(), field: "message".into() }
        })?;
        Ok((kind.to_string(), message.to_string()))
    }

    /// `service` field of a channel lifecycle message.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.field("service").and_then(Value::as_str)
    }

    /// `parameters` field of a channel lifecycle message.
    #[must_use]
    pub fn parameters(&self) -> Option<&Map<String, Value>> {
        self.field("parameters").and_then(Value::as_object)
    }

    // ---- wire helpers ----------------------------------------------------

    /// Serializes the message to its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if a body value cannot be
    /// serialized.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a message from its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] for non-object or untagged input.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Message type tags recognized by the core.
pub mod tags {
    /// Setup handshake, both directions.
    pub const SETUP: &str = "SETUP";
    /// Server-announced authorization state.
    pub const AUTH_STATE: &str = "AUTH_STATE";
    /// Client token submission.
    pub const AUTH: &str = "AUTH";
    /// Bidirectional liveness signal.
    pub const KEEPALIVE: &str = "KEEPALIVE";
    /// Error report, connection- or channel-scoped.
    pub const ERROR: &str = "ERROR";
    /// Client request to open a logical channel.
    pub const CHANNEL_REQUEST: &str = "CHANNEL_REQUEST";
    /// Server confirmation that a channel is open.
    pub const CHANNEL_OPENED: &str = "CHANNEL_OPENED";
    /// Client request to close a logical channel.
    pub const CHANNEL_CANCEL: &str = "CHANNEL_CANCEL";
    /// Server notification that a channel is closed.
    pub const CHANNEL_CLOSED: &str = "CHANNEL_CLOSED";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_carries_version_and_timeouts() {
        let msg = Message::setup("0.1-0.0.0", Duration::from_secs(60), Duration::from_secs(45));
        assert_eq!(msg.kind(), tags::SETUP);
        assert_eq!(msg.channel(), CONNECTION_CHANNEL);
        assert_eq!(msg.version(), Some("0.1-0.0.0"));
        assert_eq!(msg.field("keepaliveTimeout"), Some(&Value::from(60)));
        assert_eq!(msg.field("acceptKeepaliveTimeout"), Some(&Value::from(45)));
    }

    #[test]
    fn auth_state_parses_wire_values() {
        let msg = Message::new(tags::AUTH_STATE, 0).with_field("state", "AUTHORIZING");
        assert_eq!(msg.auth_state().unwrap(), AuthState::Authorizing);

        let msg = Message::new(tags::AUTH_STATE, 0).with_field("state", "WEIRD");
        assert!(matches!(msg.auth_state(), Err(ProtocolError::UnknownAuthState { .. })));

        let msg = Message::new(tags::AUTH_STATE, 0);
        assert!(matches!(msg.auth_state(), Err(ProtocolError::MissingField { .. })));
    }

    #[test]
    fn error_details_requires_both_fields() {
        let msg = Message::error(0, "TIMEOUT", "no keepalive");
        assert_eq!(msg.error_details().unwrap(), ("TIMEOUT".into(), "no keepalive".into()));

        let msg = Message::new(tags::ERROR, 0).with_field("error", "TIMEOUT");
        assert!(matches!(msg.error_details(), Err(ProtocolError::MissingField { .. })));
    }

    #[test]
    fn fractional_keepalive_timeout_is_preserved() {
        let msg = Message::new(tags::SETUP, 0).with_field("keepaliveTimeout", 0.1);
        assert_eq!(msg.keepalive_timeout(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn payload_round_trips_unknown_fields() {
        let text = r#"{"type":"FEED_SUBSCRIPTION","channel":3,"add":[{"symbol":"A"}]}"#;
        let msg = Message::decode(text).unwrap();
        assert_eq!(msg.kind(), "FEED_SUBSCRIPTION");
        assert_eq!(msg.channel(), 3);
        assert!(msg.field("add").is_some());

        let encoded = msg.encode().unwrap();
        let again = Message::decode(&encoded).unwrap();
        assert_eq!(msg, again);
    }

    #[test]
    fn missing_channel_defaults_to_connection() {
        let msg = Message::decode(r#"{"type":"KEEPALIVE"}"#).unwrap();
        assert_eq!(msg.channel(), CONNECTION_CHANNEL);
    }
}
