//! Engine configuration and negotiated connection details.

use std::time::Duration;

use braid_proto::message::{CLIENT_VERSION, PROTOCOL_VERSION};

/// Client configuration.
///
/// All knobs are advisory inputs to the protocol; none affect the wire shape
/// beyond the advertised timeout values in `SETUP`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Cadence of outbound `KEEPALIVE` messages.
    pub keepalive_interval: Duration,
    /// Liveness budget advertised to the server for our own traffic.
    pub keepalive_timeout: Duration,
    /// Largest server keepalive timeout we are willing to accept.
    pub accept_keepalive_timeout: Duration,
    /// Budget for the server's `SETUP` and first `AUTH_STATE` responses.
    pub action_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            keepalive_timeout: Duration::from_secs(60),
            accept_keepalive_timeout: Duration::from_secs(60),
            action_timeout: Duration::from_secs(10),
        }
    }
}

/// Static and negotiated facts about the current connection.
///
/// Server-derived fields are `None` until the server's `SETUP` is processed
/// and reset back to `None` on every reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDetails {
    /// Protocol version spoken by this client.
    pub protocol_version: String,
    /// This client implementation's version.
    pub client_version: String,
    /// Version announced by the server in its `SETUP`.
    pub server_version: Option<String>,
    /// Liveness budget we advertised to the server.
    pub client_keepalive_timeout: Duration,
    /// Liveness budget the server advertised to us.
    pub server_keepalive_timeout: Option<Duration>,
}

impl ConnectionDetails {
    pub(crate) fn new(config: &ClientConfig) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            client_version: CLIENT_VERSION.to_string(),
            server_version: None,
            client_keepalive_timeout: config.keepalive_timeout,
            server_keepalive_timeout: None,
        }
    }

    /// Drops everything learned from the server.
    pub(crate) fn reset(&mut self) {
        self.server_version = None;
        self.server_keepalive_timeout = None;
    }

    /// The combined version string sent in `SETUP`.
    #[must_use]
    pub fn version(&self) -> String {
        format!("{}-{}", self.protocol_version, self.client_version)
    }
}
