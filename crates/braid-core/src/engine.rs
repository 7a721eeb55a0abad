//! Connection engine.
//!
//! One [`Client`] owns one transport connection and everything that rides on
//! it: the setup handshake, the authorization state machine, the keepalive
//! exchange, peer-liveness detection with reconnection, and the channel
//! table. The client is a cheaply cloneable handle; every clone addresses
//! the same engine.
//!
//! # State machines
//!
//! ```text
//! connection:  NotConnected ──connect──> Connecting ──SETUP [+AUTHORIZED]──> Connected
//!                   ▲                        │  ▲                               │
//!                   └──────disconnect────────┘  └───────────reconnect───────────┘
//!
//! auth:        Unauthorized ──AUTH sent──> Authorizing ──AUTH_STATE──> Authorized
//! ```
//!
//! `Connected` is entered only once a server `SETUP` has been observed and
//! either no auth token was ever set or the server signalled `AUTHORIZED`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use braid_proto::message::tags;
use braid_proto::{AuthState, ConnectionKind, LifecycleKind, Message, MessageClass, CONNECTION_CHANNEL};
use serde_json::{Map, Value};

use crate::channel::{Channel, ChannelStatus, MessageSink};
use crate::completion::{Completion, CompletionHandle};
use crate::config::{ClientConfig, ConnectionDetails};
use crate::env::{Environment, SystemEnv};
use crate::error::{ChannelError, ClientError};
use crate::listener::{ListenerId, ListenerSet};
use crate::timer::{TimerKey, TimerRegistry};
use crate::transport::{Transport, TransportFactory};

/// Floor for the peer-liveness check interval.
const MIN_LIVENESS_INTERVAL: Duration = Duration::from_millis(200);

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport, or the connection was torn down.
    NotConnected,
    /// A transport exists but the handshake (and any required auth) has not
    /// completed for the current socket session.
    Connecting,
    /// Setup complete and, when a token is set, authorization granted.
    Connected,
}

/// Deferred listener work, dispatched after the engine lock is released so
/// listeners may freely call back into the engine.
enum Effect {
    Conn(ConnectionState),
    Auth(AuthState),
    PublishError(ClientError),
    Resolve(Vec<CompletionHandle>, Result<(), ClientError>),
    ChannelOpened(Channel),
    ChannelRequested(Channel),
    ChannelClosed(Channel),
    ChannelPayload(Channel, Message),
    ChannelError(Channel, String, String),
}

struct SharedState {
    inner: Mutex<Inner>,
    conn_listeners: ListenerSet<ConnectionState>,
    auth_listeners: ListenerSet<AuthState>,
    error_listeners: ListenerSet<ClientError>,
}

/// The protocol engine handle.
///
/// All operations serialize through one internal lock, so transport
/// callbacks, timer firings, and user calls behave as a single logical
/// queue regardless of which thread they arrive on.
pub struct Client<E: Environment = SystemEnv> {
    shared: Arc<SharedState>,
    env: E,
}

impl<E: Environment> Clone for Client<E> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone(), env: self.env.clone() }
    }
}

impl Client<SystemEnv> {
    /// Creates a client on the system clock.
    #[must_use]
    pub fn new(config: ClientConfig, factory: TransportFactory) -> Self {
        Self::with_env(config, factory, SystemEnv)
    }
}

impl<E: Environment> Client<E> {
    /// Creates a client with an explicit time source.
    #[must_use]
    pub fn with_env(config: ClientConfig, factory: TransportFactory, env: E) -> Self {
        let details = ConnectionDetails::new(&config);
        let inner = Inner {
            config,
            conn_state: ConnectionState::NotConnected,
            auth_state: AuthState::Unauthorized,
            details,
            factory,
            transport: None,
            timers: TimerRegistry::new(),
            channels: HashMap::new(),
            next_channel_id: 1,
            auth_token: None,
            first_auth_state: true,
            reconnect_attempts: 0,
            last_sent: None,
            last_received: None,
            connect_waiters: Vec::new(),
        };
        let shared = Arc::new(SharedState {
            inner: Mutex::new(inner),
            conn_listeners: ListenerSet::new(),
            auth_listeners: ListenerSet::new(),
            error_listeners: ListenerSet::new(),
        });
        Self { shared, env }
    }

    // ---- public surface --------------------------------------------------

    /// Connects to `url`.
    ///
    /// If a transport for the same url already exists the returned
    /// completion is already resolved. Otherwise any prior connection is
    /// torn down, a fresh transport is created and started, and the
    /// completion resolves on the next transition to
    /// [`ConnectionState::Connected`] or rejects on the next transition to
    /// [`ConnectionState::NotConnected`].
    pub fn connect(&self, url: &str) -> Completion {
        let mut effects = Vec::new();
        let completion = {
            let mut inner = self.lock();
            if inner.transport.as_ref().is_some_and(|t| t.url() == url) {
                return Completion::ready(Ok(()));
            }
            inner.disconnect(&mut effects);
            inner.set_conn_state(ConnectionState::Connecting, &mut effects);
            let mut transport = (inner.factory)(url);
            transport.start();
            inner.transport = Some(transport);
            let (completion, handle) = Completion::new();
            inner.connect_waiters.push(handle);
            completion
        };
        self.run_effects(effects);
        completion
    }

    /// Tears down the transport session and schedules a delayed restart.
    ///
    /// No-op unless a connection attempt or session is active.
    pub fn reconnect(&self) {
        let now = self.env.now();
        let mut effects = Vec::new();
        self.lock().reconnect(now, &mut effects);
        self.run_effects(effects);
    }

    /// Disconnects and resets all transient state. Idempotent.
    pub fn disconnect(&self) {
        let mut effects = Vec::new();
        self.lock().disconnect(&mut effects);
        self.run_effects(effects);
    }

    /// Snapshot of static and negotiated connection details.
    #[must_use]
    pub fn connection_details(&self) -> ConnectionDetails {
        self.lock().details.clone()
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.lock().conn_state
    }

    /// Registers a connection-state listener.
    pub fn add_connection_state_listener(
        &self,
        f: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> ListenerId {
        self.shared.conn_listeners.add(f)
    }

    /// Removes a connection-state listener.
    pub fn remove_connection_state_listener(&self, id: ListenerId) {
        self.shared.conn_listeners.remove(id);
    }

    /// Remembers `token` for this and future transport sessions and, when
    /// already connected, submits it immediately.
    ///
    /// The token is kept across reconnects until the server explicitly
    /// rejects it with a post-informational `AUTH_STATE = UNAUTHORIZED`.
    pub fn set_auth_token(&self, token: impl Into<String>) {
        let now = self.env.now();
        let token = token.into();
        let mut effects = Vec::new();
        {
            let mut inner = self.lock();
            inner.auth_token = Some(token.clone());
            if inner.conn_state == ConnectionState::Connected {
                inner.send_or_log(Message::auth(&token), now);
                inner.set_auth_state(AuthState::Authorizing, &mut effects);
            }
        }
        self.run_effects(effects);
    }

    /// Current authorization state.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.lock().auth_state
    }

    /// Registers an auth-state listener.
    pub fn add_auth_state_listener(
        &self,
        f: impl Fn(&AuthState) + Send + Sync + 'static,
    ) -> ListenerId {
        self.shared.auth_listeners.add(f)
    }

    /// Removes an auth-state listener.
    pub fn remove_auth_state_listener(&self, id: ListenerId) {
        self.shared.auth_listeners.remove(id);
    }

    /// Registers an error listener. While at least one listener is
    /// registered, connection-scoped errors are delivered instead of logged.
    pub fn add_error_listener(&self, f: impl Fn(&ClientError) + Send + Sync + 'static) -> ListenerId {
        self.shared.error_listeners.add(f)
    }

    /// Removes an error listener.
    pub fn remove_error_listener(&self, id: ListenerId) {
        self.shared.error_listeners.remove(id);
    }

    /// Opens a logical channel for `service`.
    ///
    /// The channel starts in [`ChannelStatus::Requested`]. Its
    /// `CHANNEL_REQUEST` goes out immediately when the connection is both
    /// connected and authorized; otherwise it is sent automatically on the
    /// next successful authorization.
    pub fn open_channel(&self, service: impl Into<String>, parameters: Map<String, Value>) -> Channel {
        let now = self.env.now();
        let sink = self.message_sink();
        let mut inner = self.lock();
        let id = inner.next_channel_id;
        inner.next_channel_id += 2;
        let channel = Channel::new(id, service, parameters, sink);
        inner.channels.insert(id, channel.clone());
        if inner.conn_state == ConnectionState::Connected && inner.auth_state == AuthState::Authorized
        {
            let request =
                Message::channel_request(id, channel.service(), channel.parameters().clone());
            inner.send_or_log(request, now);
        }
        channel
    }

    // ---- transport adapter surface ---------------------------------------

    /// Adapter callback: the socket session is open.
    pub fn transport_opened(&self) {
        let now = self.env.now();
        let mut effects = Vec::new();
        self.lock().handle_open(now, &mut effects);
        self.run_effects(effects);
    }

    /// Adapter callback: a decoded message arrived.
    pub fn transport_message(&self, message: Message) {
        let now = self.env.now();
        let mut effects = Vec::new();
        self.lock().handle_message(message, now, &mut effects);
        self.run_effects(effects);
    }

    /// Adapter callback: the socket session closed.
    pub fn transport_closed(&self) {
        let now = self.env.now();
        let mut effects = Vec::new();
        self.lock().handle_close(now, &mut effects);
        self.run_effects(effects);
    }

    // ---- timer driving ---------------------------------------------------

    /// Earliest pending timer deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.lock().timers.next_deadline()
    }

    /// Fires every timer whose deadline has passed, in deadline order.
    ///
    /// Call periodically, or when [`Client::next_deadline`] passes.
    pub fn tick(&self) {
        let now = self.env.now();
        let mut effects = Vec::new();
        {
            let mut inner = self.lock();
            while let Some(key) = inner.timers.pop_due(now) {
                inner.fire_timer(key, now, &mut effects);
            }
        }
        self.run_effects(effects);
    }

    // ---- internals -------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds the outbound sink injected into channels. The sink holds only
    /// a weak reference to the engine, so channels never keep it alive.
    fn message_sink(&self) -> MessageSink {
        let weak: Weak<SharedState> = Arc::downgrade(&self.shared);
        let env = self.env.clone();
        Arc::new(move |message: Message| {
            let shared = weak.upgrade().ok_or(ChannelError::Detached)?;
            let now = env.now();
            let mut inner = shared.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.send(message, now).map_err(|e| ChannelError::Send(e.to_string()))
        })
    }

    fn run_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Conn(state) => self.shared.conn_listeners.notify(&state),
                Effect::Auth(state) => self.shared.auth_listeners.notify(&state),
                Effect::PublishError(error) => {
                    if self.shared.error_listeners.is_empty() {
                        tracing::error!(error = %error, "unhandled client error");
                    } else {
                        self.shared.error_listeners.notify(&error);
                    }
                }
                Effect::Resolve(handles, result) => {
                    for handle in handles {
                        handle.resolve(result.clone());
                    }
                }
                Effect::ChannelOpened(channel) => channel.process_status_opened(),
                Effect::ChannelRequested(channel) => channel.process_status_requested(),
                Effect::ChannelClosed(channel) => channel.process_status_closed(),
                Effect::ChannelPayload(channel, message) => channel.process_payload(&message),
                Effect::ChannelError(channel, kind, message) => channel.process_error(kind, message),
            }
        }
    }
}

struct Inner {
    config: ClientConfig,
    conn_state: ConnectionState,
    auth_state: AuthState,
    details: ConnectionDetails,
    factory: TransportFactory,
    transport: Option<Box<dyn Transport>>,
    timers: TimerRegistry,
    channels: HashMap<u64, Channel>,
    next_channel_id: u64,
    auth_token: Option<String>,
    first_auth_state: bool,
    reconnect_attempts: u32,
    last_sent: Option<Instant>,
    last_received: Option<Instant>,
    connect_waiters: Vec<CompletionHandle>,
}

impl Inner {
    // ---- state transitions -----------------------------------------------

    fn set_conn_state(&mut self, next: ConnectionState, effects: &mut Vec<Effect>) {
        if self.conn_state == next {
            return;
        }
        tracing::debug!(from = ?self.conn_state, to = ?next, "connection state");
        self.conn_state = next;
        effects.push(Effect::Conn(next));
        match next {
            ConnectionState::Connected => self.resolve_waiters(Ok(()), effects),
            ConnectionState::NotConnected => {
                self.resolve_waiters(Err(ClientError::ConnectionClosed), effects);
            }
            ConnectionState::Connecting => {}
        }
    }

    fn set_auth_state(&mut self, next: AuthState, effects: &mut Vec<Effect>) {
        if self.auth_state == next {
            return;
        }
        tracing::debug!(from = ?self.auth_state, to = ?next, "auth state");
        self.auth_state = next;
        effects.push(Effect::Auth(next));
    }

    fn resolve_waiters(&mut self, result: Result<(), ClientError>, effects: &mut Vec<Effect>) {
        if self.connect_waiters.is_empty() {
            return;
        }
        let handles = std::mem::take(&mut self.connect_waiters);
        effects.push(Effect::Resolve(handles, result));
    }

    // ---- outbound --------------------------------------------------------

    /// Submits a message to the transport. Every successful submission
    /// re-arms the keepalive timer, so the keepalive cadence is measured
    /// from the last outbound message of any kind.
    fn send(&mut self, message: Message, now: Instant) -> Result<(), ClientError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        transport.send(&message).map_err(|e| ClientError::Transport(e.to_string()))?;
        self.last_sent = Some(now);
        self.timers.schedule(TimerKey::Keepalive, now + self.config.keepalive_interval);
        Ok(())
    }

    fn send_or_log(&mut self, message: Message, now: Instant) {
        let kind = message.kind().to_string();
        if let Err(e) = self.send(message, now) {
            tracing::warn!(kind = %kind, error = %e, "outbound message dropped");
        }
    }

    // ---- lifecycle -------------------------------------------------------

    fn disconnect(&mut self, effects: &mut Vec<Effect>) {
        if self.conn_state == ConnectionState::NotConnected {
            return;
        }
        if let Some(mut transport) = self.transport.take() {
            transport.stop();
        }
        self.timers.cancel_all();
        self.reset_session();
        self.reconnect_attempts = 0;
        self.set_conn_state(ConnectionState::NotConnected, effects);
        self.set_auth_state(AuthState::Unauthorized, effects);
    }

    fn reconnect(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.conn_state == ConnectionState::NotConnected {
            return;
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.stop();
        }
        self.timers.cancel_all();
        self.reset_session();
        self.reconnect_attempts += 1;
        self.set_conn_state(ConnectionState::Connecting, effects);
        let backoff = Duration::from_millis(u64::from(self.reconnect_attempts) * 1000);
        self.timers.schedule(TimerKey::Reconnect, now + backoff);
        tracing::debug!(attempt = self.reconnect_attempts, backoff_ms = backoff.as_millis() as u64, "reconnect scheduled");
    }

    /// Clears per-socket-session state. Remembered auth token and the
    /// channel table survive; they belong to the client, not the session.
    fn reset_session(&mut self) {
        self.details.reset();
        self.last_sent = None;
        self.last_received = None;
        self.first_auth_state = true;
    }

    // ---- transport events ------------------------------------------------

    fn handle_open(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.transport.is_none() {
            tracing::debug!("open event with no transport, ignoring");
            return;
        }
        let setup = Message::setup(
            &self.details.version(),
            self.config.keepalive_timeout,
            self.config.accept_keepalive_timeout,
        );
        self.send_or_log(setup, now);
        self.timers.schedule(TimerKey::Setup, now + self.config.action_timeout);
        self.timers.schedule(TimerKey::AuthState, now + self.config.action_timeout);
        if let Some(token) = self.auth_token.clone() {
            self.send_or_log(Message::auth(&token), now);
            self.set_auth_state(AuthState::Authorizing, effects);
        }
    }

    fn handle_message(&mut self, message: Message, now: Instant, effects: &mut Vec<Effect>) {
        if self.transport.is_none() {
            tracing::debug!(kind = %message.kind(), "message with no transport, ignoring");
            return;
        }
        self.last_received = Some(now);

        // Compensates for a suspended keepalive timer on throttled runtimes:
        // any inbound traffic is an opportunity to prove we are still here.
        if let Some(last_sent) = self.last_sent {
            if now.duration_since(last_sent) >= self.config.keepalive_interval {
                self.send_or_log(Message::keepalive(), now);
            }
        }

        match message.class() {
            MessageClass::Connection(kind) => match kind {
                ConnectionKind::Setup => self.handle_setup(&message, now, effects),
                ConnectionKind::AuthState => self.handle_auth_state(&message, now, effects),
                ConnectionKind::Keepalive => {} // liveness already recorded above
                ConnectionKind::Error => match message.error_details() {
                    Ok((kind, text)) => {
                        effects.push(Effect::PublishError(ClientError::Server { kind, message: text }));
                    }
                    Err(e) => tracing::warn!(error = %e, "malformed connection error"),
                },
                ConnectionKind::Auth => {
                    tracing::debug!("ignoring client-directed AUTH message");
                }
                ConnectionKind::Unrecognized => {
                    tracing::debug!(kind = %message.kind(), "unrecognized connection message");
                }
            },
            MessageClass::Lifecycle(kind) => self.dispatch_lifecycle(kind, &message, effects),
            MessageClass::Payload => self.dispatch_payload(message, effects),
        }
    }

    fn handle_close(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.transport.is_none() {
            return;
        }
        if self.auth_state == AuthState::Unauthorized {
            // The server closed on us while unauthorized: a deliberate
            // rejection, not a network fault. Retrying would loop.
            self.auth_token = None;
            self.disconnect(effects);
        } else {
            self.reconnect(now, effects);
        }
    }

    // ---- connection-level handlers ---------------------------------------

    fn handle_setup(&mut self, message: &Message, now: Instant, effects: &mut Vec<Effect>) {
        self.timers.cancel(TimerKey::Setup);
        if let Some(version) = message.version() {
            self.details.server_version = Some(version.to_string());
        }
        let server_keepalive =
            message.keepalive_timeout().unwrap_or(self.config.accept_keepalive_timeout);
        self.details.server_keepalive_timeout = Some(server_keepalive);
        self.reconnect_attempts = 0;
        if self.auth_token.is_none() {
            // The server requires no auth from us; setup alone completes
            // the connection.
            self.set_conn_state(ConnectionState::Connected, effects);
        }
        self.timers.schedule(TimerKey::Liveness, now + server_keepalive.max(MIN_LIVENESS_INTERVAL));
    }

    fn handle_auth_state(&mut self, message: &Message, now: Instant, effects: &mut Vec<Effect>) {
        self.timers.cancel(TimerKey::AuthState);
        let state = match message.auth_state() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "malformed AUTH_STATE");
                return;
            }
        };
        // The first auth state per socket session only tells us whether the
        // server wants auth at all; it never invalidates a remembered token.
        let first = std::mem::replace(&mut self.first_auth_state, false);
        if !first && state == AuthState::Unauthorized {
            self.auth_token = None;
        }
        if state == AuthState::Authorized {
            self.set_conn_state(ConnectionState::Connected, effects);
            self.request_active_channels(now, effects);
        }
        self.set_auth_state(state, effects);
    }

    // ---- channel dispatch ------------------------------------------------

    fn dispatch_lifecycle(&mut self, kind: LifecycleKind, message: &Message, effects: &mut Vec<Effect>) {
        let Some(channel) = self.channels.get(&message.channel()).cloned() else {
            tracing::warn!(channel = message.channel(), kind = %message.kind(), "message for unknown channel dropped");
            return;
        };
        match kind {
            LifecycleKind::ChannelOpened => effects.push(Effect::ChannelOpened(channel)),
            LifecycleKind::ChannelClosed => effects.push(Effect::ChannelClosed(channel)),
            LifecycleKind::Error => match message.error_details() {
                Ok((kind, text)) => effects.push(Effect::ChannelError(channel, kind, text)),
                Err(e) => tracing::warn!(error = %e, "malformed channel error"),
            },
            LifecycleKind::ChannelRequest | LifecycleKind::ChannelCancel => {
                tracing::debug!(kind = %message.kind(), "client-directed lifecycle message ignored");
            }
        }
    }

    fn dispatch_payload(&mut self, message: Message, effects: &mut Vec<Effect>) {
        let Some(channel) = self.channels.get(&message.channel()).cloned() else {
            tracing::warn!(channel = message.channel(), kind = %message.kind(), "message for unknown channel dropped");
            return;
        };
        effects.push(Effect::ChannelPayload(channel, message));
    }

    /// Re-requests every live channel after a successful (re)authorization
    /// and prunes channels that closed in the meantime.
    fn request_active_channels(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let mut ids: Vec<u64> = self.channels.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let Some(channel) = self.channels.get(&id).cloned() else { continue };
            if channel.status() == ChannelStatus::Closed {
                self.channels.remove(&id);
                continue;
            }
            let request =
                Message::channel_request(id, channel.service(), channel.parameters().clone());
            self.send_or_log(request, now);
            effects.push(Effect::ChannelRequested(channel));
        }
    }

    // ---- timers ----------------------------------------------------------

    fn fire_timer(&mut self, key: TimerKey, now: Instant, effects: &mut Vec<Effect>) {
        match key {
            TimerKey::Keepalive => self.send_or_log(Message::keepalive(), now),
            TimerKey::Setup => self.action_timed_out(tags::SETUP, now, effects),
            TimerKey::AuthState => self.action_timed_out(tags::AUTH_STATE, now, effects),
            TimerKey::Liveness => self.check_liveness(now, effects),
            TimerKey::Reconnect => {
                if let Some(transport) = self.transport.as_mut() {
                    transport.start();
                }
            }
        }
    }

    fn action_timed_out(&mut self, operation: &str, now: Instant, effects: &mut Vec<Effect>) {
        let waited = self.config.action_timeout;
        let text = format!("{operation} response not received within {}ms", waited.as_millis());
        self.send_or_log(Message::error(CONNECTION_CHANNEL, "TIMEOUT", &text), now);
        let error = ClientError::Timeout { operation: operation.to_string(), waited };
        effects.push(Effect::PublishError(error.clone()));
        self.resolve_waiters(Err(error), effects);
        self.disconnect(effects);
    }

    fn check_liveness(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let budget = self
            .details
            .server_keepalive_timeout
            .unwrap_or(self.config.accept_keepalive_timeout);
        let delta = now.duration_since(self.last_received.unwrap_or(now));
        if delta >= budget {
            let text = format!("No keepalive received for {}ms", delta.as_millis());
            self.send_or_log(Message::error(CONNECTION_CHANNEL, "TIMEOUT", &text), now);
            self.reconnect(now, effects);
        } else {
            let remaining = budget - delta;
            self.timers.schedule(TimerKey::Liveness, now + remaining.max(MIN_LIVENESS_INTERVAL));
        }
    }
}

#[cfg(test)]
mod tests {
    use braid_proto::message::tags;

    use super::*;

    #[derive(Clone)]
    struct TestEnv {
        now: Arc<Mutex<Instant>>,
    }

    impl TestEnv {
        fn new() -> Self {
            Self { now: Arc::new(Mutex::new(Instant::now())) }
        }

        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Environment for TestEnv {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct TestWire {
        sent: Arc<Mutex<Vec<Message>>>,
        starts: Arc<Mutex<u32>>,
        stops: Arc<Mutex<u32>>,
    }

    impl TestWire {
        fn factory(&self) -> TransportFactory {
            let wire = self.clone();
            Box::new(move |url| {
                Box::new(TestTransport { url: url.to_string(), wire: wire.clone() })
            })
        }

        fn sent_kinds(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|m| m.kind().to_string()).collect()
        }
    }

    struct TestTransport {
        url: String,
        wire: TestWire,
    }

    impl Transport for TestTransport {
        fn start(&mut self) {
            *self.wire.starts.lock().unwrap() += 1;
        }

        fn stop(&mut self) {
            *self.wire.stops.lock().unwrap() += 1;
        }

        fn send(&mut self, message: &Message) -> Result<(), crate::transport::TransportError> {
            self.wire.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        fn url(&self) -> &str {
            &self.url
        }
    }

    fn server_setup(keepalive_secs: u64) -> Message {
        Message::new(tags::SETUP, 0)
            .with_field("version", "1.0")
            .with_field("keepaliveTimeout", keepalive_secs)
    }

    fn auth_state(state: &str) -> Message {
        Message::new(tags::AUTH_STATE, 0).with_field("state", state)
    }

    #[test]
    fn no_auth_handshake_reaches_connected() {
        let env = TestEnv::new();
        let wire = TestWire::default();
        let client = Client::with_env(ClientConfig::default(), wire.factory(), env.clone());

        let completion = client.connect("wss://demo");
        assert_eq!(client.connection_state(), ConnectionState::Connecting);

        client.transport_opened();
        assert_eq!(wire.sent_kinds(), vec![tags::SETUP]);

        client.transport_message(server_setup(45));
        assert_eq!(client.connection_state(), ConnectionState::Connected);
        assert_eq!(client.auth_state(), AuthState::Unauthorized);
        assert_eq!(completion.try_result(), Some(Ok(())));

        let details = client.connection_details();
        assert_eq!(details.server_version.as_deref(), Some("1.0"));
        assert_eq!(details.server_keepalive_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn auth_handshake_connects_only_on_authorized() {
        let env = TestEnv::new();
        let wire = TestWire::default();
        let client = Client::with_env(ClientConfig::default(), wire.factory(), env.clone());

        client.set_auth_token("T");
        let completion = client.connect("wss://demo");
        client.transport_opened();
        assert_eq!(wire.sent_kinds(), vec![tags::SETUP, tags::AUTH]);
        assert_eq!(client.auth_state(), AuthState::Authorizing);

        client.transport_message(server_setup(60));
        assert_eq!(client.connection_state(), ConnectionState::Connecting);
        assert_eq!(completion.try_result(), None);

        // First auth state is informational; the token survives it.
        client.transport_message(auth_state("UNAUTHORIZED"));
        assert_eq!(client.auth_state(), AuthState::Unauthorized);
        assert_eq!(client.connection_state(), ConnectionState::Connecting);

        client.transport_message(auth_state("AUTHORIZED"));
        assert_eq!(client.auth_state(), AuthState::Authorized);
        assert_eq!(client.connection_state(), ConnectionState::Connected);
        assert_eq!(completion.try_result(), Some(Ok(())));
    }

    #[test]
    fn setup_timeout_publishes_and_disconnects() {
        let env = TestEnv::new();
        let wire = TestWire::default();
        let client = Client::with_env(ClientConfig::default(), wire.factory(), env.clone());

        let errors: Arc<Mutex<Vec<ClientError>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        client.add_error_listener(move |e| sink.lock().unwrap().push(e.clone()));

        let completion = client.connect("wss://demo");
        client.transport_opened();

        env.advance(Duration::from_secs(11));
        client.tick();

        assert_eq!(client.connection_state(), ConnectionState::NotConnected);
        let errors = errors.lock().unwrap();
        assert!(matches!(errors[0], ClientError::Timeout { .. }));
        assert!(matches!(completion.try_result(), Some(Err(ClientError::Timeout { .. }))));
        assert!(wire.sent_kinds().contains(&tags::ERROR.to_string()));
    }

    #[test]
    fn connect_to_same_url_is_a_no_op() {
        let env = TestEnv::new();
        let wire = TestWire::default();
        let client = Client::with_env(ClientConfig::default(), wire.factory(), env);

        let _ = client.connect("wss://demo");
        let second = client.connect("wss://demo");
        assert_eq!(second.try_result(), Some(Ok(())));
        assert_eq!(*wire.starts.lock().unwrap(), 1);
    }

    #[test]
    fn disconnect_twice_notifies_once() {
        let env = TestEnv::new();
        let wire = TestWire::default();
        let client = Client::with_env(ClientConfig::default(), wire.factory(), env);

        let transitions: Arc<Mutex<Vec<ConnectionState>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = transitions.clone();
        client.add_connection_state_listener(move |s| sink.lock().unwrap().push(*s));

        let _ = client.connect("wss://demo");
        client.disconnect();
        client.disconnect();

        assert_eq!(
            *transitions.lock().unwrap(),
            vec![ConnectionState::Connecting, ConnectionState::NotConnected]
        );
    }

    #[test]
    fn channel_ids_are_odd_and_monotonic() {
        let env = TestEnv::new();
        let wire = TestWire::default();
        let client = Client::with_env(ClientConfig::default(), wire.factory(), env);

        let ids: Vec<u64> =
            (0..4).map(|_| client.open_channel("FEED", Map::new()).id()).collect();
        assert_eq!(ids, vec![1, 3, 5, 7]);
    }
}
