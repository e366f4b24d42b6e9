//! Deliver items at least once through an elastic, acknowledged queue.
//!
//! The crate is built from three layers:
//!
//! - [ring::Ring]: a growable circular buffer that either extends when full or covers (overwrites)
//!   its oldest entry.
//! - [pipe::Pipe]: a pump task that moves values from an inbound port into a [ring::Ring] and
//!   from the [ring::Ring] to an outbound port, so producers never wait on consumers.
//! - [delivery::Queue]: a facade over a [pipe::Pipe] that tracks deliveries made with a deadline
//!   and redelivers any that are not acknowledged in time.
//!
//! # Status
//!
//! `commonware-queue` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

use thiserror::Error;

pub mod delivery;
pub mod pipe;
pub mod ring;

pub use delivery::{Config, Delivery, Queue};

/// Errors that can occur when interacting with a [pipe::Pipe] or [ring::Ring].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("closed")]
    Closed,
    #[error("cannot shrink capacity to {requested} below length {len}")]
    Shrink { len: usize, requested: usize },
}
