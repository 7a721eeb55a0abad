//! Client-side protocol engine for the braid protocol.
//!
//! The engine manages the lifecycle of one transport connection: the setup
//! handshake, authorization, bidirectional keepalive with timeout-driven
//! reconnection, and the multiplexing of logical channels over the single
//! transport.
//!
//! # Architecture
//!
//! The engine is a passive state machine. It spawns no tasks, performs no
//! I/O of its own, and never reads the wall clock directly: time comes in
//! through an [`env::Environment`] and timers are a deadline map fired by
//! [`Client::tick`]. Whatever drives the engine (the `braid-runtime` loop
//! in production, a test with a simulated clock) asks for
//! [`Client::next_deadline`] and calls `tick` when it passes.
//!
//! The transport is an injected trait object behind the narrow contract in
//! [`transport`]; adapter events enter through [`Client::transport_opened`],
//! [`Client::transport_message`], and [`Client::transport_closed`]. All
//! engine state is serialized through a single lock, so callbacks, timers,
//! and user operations interleave safely from any thread while behaving as
//! one logical queue. Listener fan-out happens after the lock is released,
//! so listeners are free to call back into the engine.
//!
//! # Components
//!
//! - [`engine`]: the connection engine ([`Client`])
//! - [`channel`]: logical channel handles and their listener sets
//! - [`timer`]: keyed deadline registry
//! - [`transport`]: transport adapter contract
//! - [`mod@env`]: time abstraction
//! - [`completion`]: one-shot future returned by [`Client::connect`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod completion;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod listener;
pub mod timer;
pub mod transport;

pub use braid_proto::{AuthState, Message};
pub use channel::{Channel, ChannelErrorEvent, ChannelStatus, StatusChange};
pub use completion::Completion;
pub use config::{ClientConfig, ConnectionDetails};
pub use engine::{Client, ConnectionState};
pub use env::{Environment, SystemEnv};
pub use error::{ChannelError, ClientError};
pub use listener::ListenerId;
pub use transport::{Transport, TransportError, TransportFactory};
