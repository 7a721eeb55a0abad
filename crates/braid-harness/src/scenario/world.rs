//! World state handed to scenario oracles.

use braid_core::{Client, Completion, Message};

use crate::{SimEnv, SimNet, SimTransport};

/// Everything a scenario produced, for oracle verification.
pub struct World {
    /// The simulated clock driving the client.
    pub env: SimEnv,
    /// The recording transport layer.
    pub net: SimNet,
    /// The client under test.
    pub client: Client<SimEnv>,
    /// Completion returned by the scenario's `connect`.
    pub connect_result: Completion,
}

impl World {
    /// The active transport.
    ///
    /// # Errors
    ///
    /// Fails when the scenario never created a transport.
    pub fn transport(&self) -> Result<SimTransport, String> {
        self.net.transport().ok_or_else(|| "no transport was created".to_string())
    }

    /// Delivers a server message to the client.
    pub fn deliver(&self, message: Message) {
        self.client.transport_message(message);
    }

    /// Type tags sent on the active transport, in order.
    #[must_use]
    pub fn sent_kinds(&self) -> Vec<String> {
        self.net.transport().map(|t| t.sent_kinds()).unwrap_or_default()
    }
}
