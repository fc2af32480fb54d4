use std::io::{ErrorKind, Write};
use std::sync::Arc;

use bytes::BytesMut;
use framewire_transport::Stream;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::Message;
use crate::stats::FrameStats;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete, sequenced frames to any `Write` stream.
///
/// Each frame is encoded in full before the first byte is written, so a
/// failed encode never leaves a partial frame on the wire.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    stats: Arc<FrameStats>,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self::with_stats(inner, config, Arc::new(FrameStats::new()))
    }

    /// Create a frame writer that advances a shared set of counters.
    pub fn with_stats(inner: T, config: FrameConfig, stats: Arc<FrameStats>) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            stats,
        }
    }

    /// Encode and send one message (blocking).
    ///
    /// Returns the sequence number the frame was sent with. A write that
    /// exceeds the stream's write timeout fails with [`FrameError::Io`] and
    /// may leave a partial frame on the wire.
    pub fn write_message(&mut self, message: &dyn Message) -> Result<u64> {
        self.buf.clear();
        let sequence = self.stats.sent();
        encode_frame(
            sequence,
            message,
            &mut self.buf,
            self.config.max_payload_size,
        )?;
        self.stats.advance_sent();

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()?;
        Ok(sequence)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Counters shared with this writer.
    pub fn stats(&self) -> &Arc<FrameStats> {
        &self.stats
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<Stream> {
    /// Create a frame writer for a [`Stream`] and apply the write timeout from config.
    pub fn for_stream(inner: Stream, config: FrameConfig, stats: Arc<FrameStats>) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_stats(inner, config, stats))
    }
}
