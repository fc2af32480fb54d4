//! Blocking stream transports for framewire.
//!
//! Provides a unified connected [`Stream`] over TCP (and Unix socket pairs on
//! Unix, mostly useful for in-process tests), plus the [`TcpTransport`]
//! listening endpoint used by the listener accept loop.
//!
//! This is the lowest layer of framewire. Everything else builds on top of
//! the [`Stream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::Stream;
pub use tcp::TcpTransport;
