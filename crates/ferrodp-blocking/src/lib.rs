//! Blocking I/O plumbing for the FerroDP state machines.
//!
//! The core is single-threaded and cooperative: [`Framed`] exposes the
//! underlying stream so the host can `select`/`poll` on it, accumulates
//! partial PDUs in a per-session buffer and hands out exactly one complete
//! frame at a time.

mod connector;
mod framed;

pub use connector::{connect_begin, connect_finalize, single_sequence_step, ShouldUpgrade};
pub use framed::Framed;
