//! Keepalive and peer-liveness integration tests.

use std::time::Duration;

use braid_core::{Client, ClientConfig, ConnectionState, Environment, Message};
use braid_harness::{messages, SimEnv, SimNet};

/// Brings a client to `Connected` against a no-auth server advertising the
/// given keepalive budget.
fn connected(server_keepalive: Duration) -> (SimEnv, SimNet, Client<SimEnv>) {
    let env = SimEnv::new();
    let net = SimNet::new();
    let client = Client::with_env(ClientConfig::default(), net.factory(), env.clone());
    let _ = client.connect("wss://x");
    client.transport_opened();
    client.transport_message(messages::server_setup("1.0", server_keepalive));
    // Servers announce their auth state right after setup; informational
    // here, but it settles the auth-state action timer.
    client.transport_message(messages::auth_state(braid_core::AuthState::Unauthorized));
    assert_eq!(client.connection_state(), ConnectionState::Connected);
    (env, net, client)
}

#[test]
fn keepalive_fires_on_the_configured_cadence() {
    let (env, net, client) = connected(Duration::from_secs(120));
    let transport = net.transport().expect("transport");
    transport.take_sent();

    env.advance(Duration::from_secs(30));
    client.tick();
    assert_eq!(transport.sent_kinds(), vec!["KEEPALIVE"]);

    env.advance(Duration::from_secs(30));
    client.tick();
    assert_eq!(transport.sent_kinds(), vec!["KEEPALIVE", "KEEPALIVE"]);
}

#[test]
fn any_send_rearms_the_keepalive_timer() {
    let (env, net, client) = connected(Duration::from_secs(120));
    let transport = net.transport().expect("transport");

    // An authorized session so open_channel sends immediately.
    client.transport_message(messages::auth_state(braid_core::AuthState::Authorized));
    transport.take_sent();

    env.advance(Duration::from_secs(29));
    let _channel = client.open_channel("FEED", serde_json::Map::new());
    assert_eq!(transport.sent_kinds(), vec!["CHANNEL_REQUEST"]);

    // The request pushed the keepalive deadline out; 30s after connect is
    // no longer due.
    env.advance(Duration::from_secs(2));
    client.tick();
    assert_eq!(transport.sent_kinds(), vec!["CHANNEL_REQUEST"]);

    // 30s after the request, the keepalive goes out.
    env.advance(Duration::from_secs(28));
    client.tick();
    assert_eq!(transport.sent_kinds(), vec!["CHANNEL_REQUEST", "KEEPALIVE"]);
}

#[test]
fn inbound_traffic_triggers_overdue_keepalive() {
    let (env, net, client) = connected(Duration::from_secs(120));
    let transport = net.transport().expect("transport");
    transport.take_sent();

    // The timer never fires (no tick), but an inbound message arrives with
    // the cadence overdue: the engine sends a compensating keepalive first.
    env.advance(Duration::from_secs(31));
    client.transport_message(Message::keepalive());
    assert_eq!(transport.sent_kinds(), vec!["KEEPALIVE"]);
}

#[test]
fn silence_beyond_the_budget_reconnects() {
    let (env, net, client) = connected(Duration::from_secs(30));
    let transport = net.transport().expect("transport");
    transport.take_sent();

    env.advance(Duration::from_secs(31));
    client.tick();

    // The overdue keepalive fires first, then the liveness check reports
    // the timeout on the wire and begins reconnecting.
    let sent = transport.sent();
    let error = sent.iter().find(|m| m.kind() == "ERROR").expect("ERROR emitted");
    assert_eq!(
        error.error_details().unwrap(),
        ("TIMEOUT".to_string(), "No keepalive received for 31000ms".to_string())
    );

    assert_eq!(client.connection_state(), ConnectionState::Connecting);
    assert_eq!(transport.stops(), 1);
    let deadline = client.next_deadline().expect("reconnect scheduled");
    assert_eq!(deadline - env.now(), Duration::from_secs(1));
}

#[test]
fn liveness_recheck_uses_time_since_last_message() {
    let (env, net, client) = connected(Duration::from_secs(30));
    let transport = net.transport().expect("transport");
    transport.take_sent();

    // Traffic at t+20 keeps the peer alive.
    env.advance(Duration::from_secs(20));
    client.transport_message(Message::keepalive());

    // At t+30 the liveness timer fires but only 10s have elapsed since the
    // last message: no reconnect, recheck in the remaining 20s.
    env.advance(Duration::from_secs(10));
    client.tick();
    assert_eq!(client.connection_state(), ConnectionState::Connected);

    // At t+50 the budget is fully spent.
    env.advance(Duration::from_secs(20));
    client.tick();
    assert_eq!(client.connection_state(), ConnectionState::Connecting);
}

#[test]
fn liveness_recheck_never_drops_below_the_floor() {
    // A pathologically small server budget: the liveness check clamps to
    // the 200ms floor instead of spinning.
    let env = SimEnv::new();
    let net = SimNet::new();
    let client = Client::with_env(ClientConfig::default(), net.factory(), env.clone());
    let _ = client.connect("wss://x");
    client.transport_opened();
    client.transport_message(messages::server_setup("1.0", Duration::from_millis(100)));

    let deadline = client.next_deadline().expect("liveness scheduled");
    assert_eq!(deadline - env.now(), Duration::from_millis(200));

    env.advance(Duration::from_millis(200));
    client.tick();
    assert_eq!(client.connection_state(), ConnectionState::Connecting);
}
