//! Deterministic test harness for the braid protocol engine.
//!
//! Substitutes the two effectful edges of the engine, the clock and the
//! transport, with scripted implementations so every timeout, backoff, and
//! reconnect path is exercised deterministically:
//!
//! - [`SimEnv`]: a manually advanced clock implementing
//!   [`braid_core::Environment`]
//! - [`SimNet`]/[`SimTransport`]: a recording in-memory transport factory
//! - [`scenario`]: a declarative scenario builder with mandatory oracle
//!   verification

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod messages;
pub mod scenario;
pub mod sim_env;
pub mod sim_net;

pub use scenario::{Scenario, World};
pub use sim_env::SimEnv;
pub use sim_net::{SimNet, SimTransport};
