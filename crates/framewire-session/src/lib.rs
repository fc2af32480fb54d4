//! Threaded connection lifecycle over framewire connections.
//!
//! A [`Listener`] owns a bound port and an accept thread; a [`Session`] owns a
//! [`framewire_codec::Connection`] and a receive thread. Both report lifecycle
//! and data events to observers, synchronously, on their own thread.

pub mod config;
pub mod error;
pub mod listener;
pub mod observer;
pub mod session;
mod worker;

#[cfg(test)]
mod testing;

pub use config::{ListenerConfig, SessionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT};
pub use error::{Result, SessionError};
pub use listener::{Listener, ListenerObserver, ListenerState};
pub use observer::ObserverList;
pub use session::{Session, SessionObserver, SessionState};
