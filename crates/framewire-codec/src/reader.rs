use std::io::{ErrorKind, Read};
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use framewire_transport::Stream;
use tracing::{error, warn};

use crate::codec::{FrameConfig, MarkerScan, HEAD, TAIL};
use crate::error::{FrameError, Result};
use crate::message::Message;
use crate::registry::{resolve, Registry};
use crate::stats::FrameStats;
use crate::wire::WireReader;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Chunked read-ahead over the raw stream.
struct Source<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> Read for Source<T> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while self.buf.is_empty() {
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match self.inner.read(&mut chunk) {
                Ok(0) => return Ok(0),
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        let n = out.len().min(self.buf.len());
        self.buf.copy_to_slice(&mut out[..n]);
        Ok(n)
    }
}

/// Reads sequenced, type-tagged frames from any `Read` stream.
///
/// Framing anomalies (garbage before the head marker, an unexpected sequence
/// number, a bad tail marker, an unregistered type id) are logged and counted
/// in [`FrameStats`] but never returned as errors. Only I/O failures and
/// payload data errors surface to the caller.
pub struct FrameReader<T> {
    source: Source<T>,
    config: FrameConfig,
    stats: Arc<FrameStats>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self::with_stats(inner, config, Arc::new(FrameStats::new()))
    }

    /// Create a frame reader that advances a shared set of counters.
    pub fn with_stats(inner: T, config: FrameConfig, stats: Arc<FrameStats>) -> Self {
        Self {
            source: Source {
                inner,
                buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            },
            config,
            stats,
        }
    }

    /// Read and decode the next message (blocking).
    ///
    /// `registries` are consulted in order to resolve the frame's type id.
    /// Returns `Ok(None)` when no registry knows the type id; the unknown
    /// payload is skipped through the next tail marker so the following call
    /// starts on a frame boundary. Returns `Err(FrameError::ConnectionClosed)`
    /// when EOF is reached.
    pub fn read_message(&mut self, registries: &[&Registry]) -> Result<Option<Box<dyn Message>>> {
        let discarded = self.scan_through(HEAD)?;
        if discarded > 0 {
            self.stats.record_resync(discarded);
            warn!(discarded, "head marker resync discarded bytes");
        }

        let sequence = self.wire().read_u64()?;
        let expected = self.stats.advance_received();
        if sequence != expected {
            self.stats.record_sequence_mismatch();
            warn!(expected, actual = sequence, "frame sequence mismatch");
        }

        let type_id = self.wire().read_i32()?;
        let Some(mut message) = resolve(registries, type_id) else {
            self.stats.record_unknown_type();
            error!(type_id, sequence, "unknown message type");
            let drained = self.scan_through(TAIL)?;
            self.stats.record_discarded(drained);
            return Ok(None);
        };

        if let Err(err) = message.decode(&mut self.wire()) {
            if err.is_transport() {
                return Err(err);
            }
            self.stats.record_decode_failure();
            warn!(type_id, sequence, error = %err, "payload decode failed");
            let drained = self.scan_through(TAIL)?;
            self.stats.record_discarded(drained);
            return Err(err);
        }

        let tail = self.wire().read_raw::<4>()?;
        if tail != TAIL {
            self.stats.record_bad_tail();
            warn!(type_id, sequence, ?tail, "bad tail marker");
        }

        Ok(Some(message))
    }

    fn wire(&mut self) -> WireReader<'_> {
        WireReader::with_limit(&mut self.source, self.config.max_payload_size)
    }

    /// Consume bytes up to and including the next occurrence of `marker`.
    /// Returns how many bytes were skipped before it.
    fn scan_through(&mut self, marker: [u8; 4]) -> Result<u64> {
        let mut scan = MarkerScan::new(marker);
        loop {
            let byte = self.wire().read_u8()?;
            if scan.push(byte) {
                return Ok(scan.discarded());
            }
        }
    }

    /// Counters shared with this reader.
    pub fn stats(&self) -> &Arc<FrameStats> {
        &self.stats
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.source.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.source.inner
    }

    /// Consume the reader and return the inner stream.
    ///
    /// Any bytes already read ahead are lost.
    pub fn into_inner(self) -> T {
        self.source.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<Stream> {
    /// Create a frame reader for a [`Stream`] and apply the read timeout from config.
    pub fn for_stream(inner: Stream, config: FrameConfig, stats: Arc<FrameStats>) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_stats(inner, config, stats))
    }
}
