use std::sync::atomic::{AtomicU64, Ordering};

/// Per-connection frame counters.
///
/// `sent` and `received` are the sequence counters: each is advanced only by
/// its own write or read path and never decremented. The rest record framing
/// anomalies that were absorbed rather than raised. All counters can be read
/// at any time without taking the read or write lock.
#[derive(Debug, Default)]
pub struct FrameStats {
    sent: AtomicU64,
    received: AtomicU64,
    resyncs: AtomicU64,
    discarded_bytes: AtomicU64,
    sequence_mismatches: AtomicU64,
    bad_tails: AtomicU64,
    unknown_types: AtomicU64,
    decode_failures: AtomicU64,
}

/// Point-in-time copy of [`FrameStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStatsSnapshot {
    pub sent: u64,
    pub received: u64,
    pub resyncs: u64,
    pub discarded_bytes: u64,
    pub sequence_mismatches: u64,
    pub bad_tails: u64,
    pub unknown_types: u64,
    pub decode_failures: u64,
}

impl FrameStatsSnapshot {
    /// Total framing anomalies observed.
    pub fn anomalies(&self) -> u64 {
        self.resyncs
            + self.sequence_mismatches
            + self.bad_tails
            + self.unknown_types
            + self.decode_failures
    }
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written so far; also the sequence number of the next frame.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Acquire)
    }

    /// Frames read so far; also the sequence number expected next.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            sent: self.sent(),
            received: self.received(),
            resyncs: self.resyncs.load(Ordering::Relaxed),
            discarded_bytes: self.discarded_bytes.load(Ordering::Relaxed),
            sequence_mismatches: self.sequence_mismatches.load(Ordering::Relaxed),
            bad_tails: self.bad_tails.load(Ordering::Relaxed),
            unknown_types: self.unknown_types.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn advance_sent(&self) -> u64 {
        self.sent.fetch_add(1, Ordering::AcqRel)
    }

    pub(crate) fn advance_received(&self) -> u64 {
        self.received.fetch_add(1, Ordering::AcqRel)
    }

    pub(crate) fn record_resync(&self, discarded: u64) {
        self.resyncs.fetch_add(1, Ordering::Relaxed);
        self.record_discarded(discarded);
    }

    pub(crate) fn record_discarded(&self, discarded: u64) {
        self.discarded_bytes.fetch_add(discarded, Ordering::Relaxed);
    }

    pub(crate) fn record_sequence_mismatch(&self) {
        self.sequence_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bad_tail(&self) {
        self.bad_tails.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unknown_type(&self) {
        self.unknown_types.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }
}
