//! Tokio driver for the braid protocol engine.
//!
//! `braid-core` is a passive state machine: it needs something to feed it
//! transport events and to fire its timers. This crate provides that glue
//! for tokio-based applications, keeping the same code path in production
//! and in tests.
//!
//! # Components
//!
//! - [`TransportEvent`]: the three adapter callbacks as a value
//! - [`EventSource`]: trait a transport adapter implements to surface events
//! - [`MpscEventSource`]: event source over a tokio mpsc channel
//! - [`Runtime`]: the select loop driving one [`braid_core::Client`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod runtime;

pub use driver::{EventSource, MpscEventSource, TransportEvent};
pub use runtime::Runtime;
