//! Sync-marked, sequenced, type-tagged message framing over byte streams.
//!
//! Every frame on the wire is:
//! - A 4-byte head marker (`FF FE FD FC`) for stream synchronization
//! - An 8-byte big-endian sequence number, one counter per direction
//! - A 4-byte big-endian type id resolved through a [`Registry`]
//! - The message's own self-delimiting payload
//! - A 4-byte tail marker (`9B 9A 99 98`)
//!
//! Readers resynchronize on the head marker after corruption, and framing
//! anomalies are counted rather than raised.

pub mod codec;
pub mod connection;
pub mod error;
pub mod message;
pub mod reader;
pub mod registry;
pub mod stats;
pub mod wire;
pub mod writer;

pub use codec::{encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEAD, HEADER_SIZE, TAIL, TRAILER_SIZE};
pub use connection::Connection;
pub use error::{FrameError, RegistryError, Result};
pub use message::{AsAny, Message, MessageType};
pub use reader::FrameReader;
pub use registry::{resolve, Factory, Registration, Registry};
pub use stats::{FrameStats, FrameStatsSnapshot};
pub use wire::{WireReader, WireWriter};
pub use writer::FrameWriter;
