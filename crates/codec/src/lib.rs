// crates/codec/src/lib.rs
//! Wire codec for the Tether sync engine
//!
//! Turns a [`Changeset`](tether_core::Changeset) into a sequence of
//! size-bounded [`SyncPayload`] chunks and back. Encoding is pure and
//! deterministic: the same changeset always produces the same bytes and the
//! same chunk boundaries, which is what makes retrying a transmission
//! idempotent. Decoding refuses to reassemble anything until every chunk of
//! a transmission has arrived.

mod codec;
mod error;
mod payload;
mod reassembly;

pub use codec::{decode, encode, SCHEMA_VERSION};
pub use error::{CodecError, CodecResult};
pub use payload::SyncPayload;
pub use reassembly::ChunkBuffer;
