//! Logical wire model for the braid protocol.
//!
//! Messages are JSON objects with two routing fields, a `type` tag and a
//! `channel` number, plus per-type fields carried in an open body map.
//! Channel 0 is reserved for connection-level traffic (setup, auth,
//! keepalive, connection-scoped errors); every other channel carries the
//! lifecycle and payload messages of one logical substream.
//!
//! This crate deliberately stops at the logical shape: framing, socket
//! management, and the physical encoding of a frame belong to the transport
//! adapter. The only commitment made here is that a message serializes to a
//! flat JSON object, so payload types the core has never heard of pass
//! through untouched.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod message;
pub mod taxonomy;

pub use errors::{ProtocolError, Result};
pub use message::{AuthState, Message, CONNECTION_CHANNEL, PROTOCOL_VERSION};
pub use taxonomy::{ConnectionKind, LifecycleKind, MessageClass};
