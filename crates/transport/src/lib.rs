// crates/transport/src/lib.rs
//! Transport seam between the sync orchestrator and the companion channel
//!
//! The orchestrator only sees the [`Transport`] trait: point-in-time
//! reachability plus a watch channel for transitions, at-least-once payload
//! send, a bulk lane for oversized transmissions, and a receive side.
//! Platform messaging stacks implement the trait; [`ChannelTransport`] is
//! the in-process implementation used by tests and demos, with scriptable
//! failures for exercising retry paths.

mod adapter;
mod channel;
mod error;

pub use adapter::{Ack, Transport};
pub use channel::ChannelTransport;
pub use error::{TransportError, TransportResult};
