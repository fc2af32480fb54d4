//! Sync-marked, sequenced message framing over TCP.
//!
//! framewire delimits typed messages on a byte stream with head and tail
//! markers and per-direction sequence numbers, recovers alignment after
//! corruption, and runs listeners and sessions on dedicated threads that
//! report to observers.
//!
//! # Crate Structure
//!
//! - [`transport`] - TCP listening and connected streams
//! - [`codec`] - Wire primitives, message registry, framing, connections
//! - [`session`] - Threaded listener and session loops (behind `session` feature)
//! - [`demo`] - Demonstration message types used by the CLI

pub mod demo;

/// Re-export transport types.
pub mod transport {
    pub use framewire_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use framewire_codec::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use framewire_session::*;
}
