//! Scenario builder API.

use std::time::Duration;

use braid_core::{AuthState, Client, ClientConfig};

use crate::messages;
use crate::scenario::{OracleFn, World};
use crate::{SimEnv, SimNet};

/// Scenario builder.
///
/// Scripts one client session against a canned server. Must call
/// [`Scenario::oracle`] to obtain a [`RunnableScenario`]; a scenario cannot
/// run unverified.
pub struct Scenario {
    name: String,
    url: String,
    config: ClientConfig,
    token: Option<String>,
    server_requires_auth: bool,
    server_version: String,
    server_keepalive: Duration,
}

impl Scenario {
    /// Creates a scenario with default configuration: no token, a server
    /// that requires no auth, and a 45 second server keepalive budget.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: "wss://sim".to_string(),
            config: ClientConfig::default(),
            token: None,
            server_requires_auth: false,
            server_version: "1.0".to_string(),
            server_keepalive: Duration::from_secs(45),
        }
    }

    /// Overrides the url passed to `connect`.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Overrides the client configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets an auth token before connecting.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Makes the canned server require authorization: it announces
    /// `UNAUTHORIZED` first and grants `AUTHORIZED` only when the scenario
    /// set a token.
    #[must_use]
    pub fn server_requires_auth(mut self) -> Self {
        self.server_requires_auth = true;
        self
    }

    /// Overrides the keepalive budget the canned server advertises.
    #[must_use]
    pub fn server_keepalive(mut self, budget: Duration) -> Self {
        self.server_keepalive = budget;
        self
    }

    /// Sets the oracle function and returns a runnable scenario.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Executes the scenario: connect, open the transport, play the canned
    /// server's handshake, then verify the world with the oracle.
    ///
    /// # Errors
    ///
    /// Returns the oracle's failure, or a description of a scripting
    /// failure (e.g. the engine never created a transport).
    pub fn run(self) -> Result<(), String> {
        let s = self.scenario;
        let env = SimEnv::new();
        let net = SimNet::new();
        let client = Client::with_env(s.config, net.factory(), env.clone());

        if let Some(token) = &s.token {
            client.set_auth_token(token.clone());
        }

        let connect_result = client.connect(&s.url);
        let transport = net
            .transport()
            .ok_or_else(|| format!("Scenario '{}': engine created no transport", s.name))?;
        if transport.starts() == 0 {
            return Err(format!("Scenario '{}': transport was never started", s.name));
        }

        client.transport_opened();
        client.transport_message(messages::server_setup(&s.server_version, s.server_keepalive));

        if s.server_requires_auth {
            client.transport_message(messages::auth_state(AuthState::Unauthorized));
            if s.token.is_some() {
                client.transport_message(messages::auth_state(AuthState::Authorized));
            }
        }

        let world = World { env, net, client, connect_result };
        (self.oracle)(&world).map_err(|e| format!("Scenario '{}': {e}", s.name))
    }
}

#[cfg(test)]
mod tests {
    use braid_core::ConnectionState;

    use super::*;
    use crate::scenario::oracle;

    #[test]
    fn scenario_requires_oracle() {
        // This should compile - oracle provided
        let _scenario = Scenario::new("test").oracle(Box::new(|_world| Ok(())));

        // This should NOT compile - no oracle
        // let scenario = Scenario::new("test");
        // scenario.run(); // ERROR: no method `run` on type `Scenario`
    }

    #[test]
    fn scenario_reports_oracle_failures() {
        let result = Scenario::new("failing")
            .oracle(oracle::connection_state_is(ConnectionState::NotConnected))
            .run();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("failing"));
    }
}
