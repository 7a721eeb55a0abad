//! Runtime-loop integration tests.
//!
//! Drives a real client through the tokio runtime loop over an mpsc event
//! source, the same wiring a production transport adapter uses.

use std::time::Duration;

use braid_core::{Client, ClientConfig, ClientError, ConnectionState};
use braid_harness::{messages, SimNet};
use braid_runtime::{MpscEventSource, Runtime, TransportEvent};

#[tokio::test]
async fn runtime_drives_the_handshake() {
    let net = SimNet::new();
    let client = Client::new(ClientConfig::default(), net.factory());
    let completion = client.connect("wss://x");

    let (tx, source) = MpscEventSource::channel();
    let handle = tokio::spawn(Runtime::new(client.clone(), source).run());

    tx.send(TransportEvent::Opened).unwrap();
    tx.send(TransportEvent::Message(messages::server_setup("1.0", Duration::from_secs(45))))
        .unwrap();

    completion.await.unwrap();
    assert_eq!(client.connection_state(), ConnectionState::Connected);
    assert_eq!(net.transport().unwrap().sent_kinds(), vec!["SETUP"]);

    drop(tx);
    handle.await.unwrap();
}

#[tokio::test]
async fn runtime_fires_due_timers() {
    let net = SimNet::new();
    let config = ClientConfig { action_timeout: Duration::from_millis(200), ..Default::default() };
    let client = Client::new(config, net.factory());
    let completion = client.connect("wss://x");

    let (tx, source) = MpscEventSource::channel();
    let handle = tokio::spawn(Runtime::new(client.clone(), source).run());

    // The server never answers the SETUP; the action timer must fire.
    tx.send(TransportEvent::Opened).unwrap();

    let result = completion.await;
    assert!(matches!(result, Err(ClientError::Timeout { .. })), "got {result:?}");
    assert_eq!(client.connection_state(), ConnectionState::NotConnected);

    drop(tx);
    handle.await.unwrap();
}

#[tokio::test]
async fn runtime_forwards_close_events() {
    let net = SimNet::new();
    let client = Client::new(ClientConfig::default(), net.factory());
    let _ = client.connect("wss://x");

    let (tx, source) = MpscEventSource::channel();
    let handle = tokio::spawn(Runtime::new(client.clone(), source).run());

    tx.send(TransportEvent::Opened).unwrap();
    tx.send(TransportEvent::Message(messages::server_setup("1.0", Duration::from_secs(45))))
        .unwrap();
    // Auth never left Unauthorized, so a close is a deliberate rejection
    // and the engine fully disconnects.
    tx.send(TransportEvent::Closed).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if client.connection_state() == ConnectionState::NotConnected {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "close event never processed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    drop(tx);
    handle.await.unwrap();
}
