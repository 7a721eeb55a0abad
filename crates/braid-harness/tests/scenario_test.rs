//! Scenario-framework tests.
//!
//! Validates the declarative builder end to end and doubles as usage
//! documentation for the oracle pattern.

use std::time::Duration;

use braid_core::{AuthState, ConnectionState};
use braid_harness::scenario::{oracle, Scenario};

#[test]
fn scenario_no_auth_handshake() {
    let result = Scenario::new("no-auth handshake")
        .oracle(oracle::all_of(vec![
            oracle::connection_state_is(ConnectionState::Connected),
            oracle::auth_state_is(AuthState::Unauthorized),
            oracle::connect_resolved(),
            oracle::sent_kinds(&["SETUP"]),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn scenario_authorized_handshake() {
    let result = Scenario::new("authorized handshake")
        .token("T")
        .server_requires_auth()
        .oracle(oracle::all_of(vec![
            oracle::connection_state_is(ConnectionState::Connected),
            oracle::auth_state_is(AuthState::Authorized),
            oracle::connect_resolved(),
            oracle::sent_kinds(&["SETUP", "AUTH"]),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn scenario_auth_required_but_no_token_connects_unauthorized() {
    // With no token ever set, setup alone completes the connection; the
    // server's UNAUTHORIZED announcement is informational.
    let result = Scenario::new("auth required, no token")
        .server_requires_auth()
        .oracle(oracle::all_of(vec![
            oracle::connection_state_is(ConnectionState::Connected),
            oracle::auth_state_is(AuthState::Unauthorized),
            oracle::connect_resolved(),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn scenario_custom_keepalive_budget_drives_liveness() {
    let result = Scenario::new("custom keepalive budget")
        .server_keepalive(Duration::from_secs(30))
        .oracle(Box::new(|world| {
            world.deliver(braid_harness::messages::auth_state(AuthState::Unauthorized));
            world.env.advance(Duration::from_secs(31));
            world.client.tick();
            match world.client.connection_state() {
                ConnectionState::Connecting => Ok(()),
                other => Err(format!("expected reconnect after silence, got {other:?}")),
            }
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}
