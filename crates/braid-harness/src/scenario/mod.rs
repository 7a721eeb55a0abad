//! Declarative scenario tests with mandatory oracle verification.
//!
//! A scenario scripts the client's side of a connection (configuration,
//! token, the server's handshake replies) and hands the resulting
//! [`World`] to an oracle for verification. The oracle is mandatory: a
//! scenario without one does not have a `run` method.

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario};
pub use oracle::OracleFn;
pub use world::World;
