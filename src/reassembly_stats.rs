use super::*;

use std::sync::atomic::AtomicU64;

/// Running counters for one engine
///
/// Updated under the table lock but readable without it.
#[derive(Debug, Default)]
pub struct ReassemblyStats {
    fragments: AtomicU64,
    reassembled: AtomicU64,
    duplicates: AtomicU64,
    zero_length: AtomicU64,
    queue_limit: AtomicU64,
    fragment_limit: AtomicU64,
    no_memory: AtomicU64,
    bad_fragments: AtomicU64,
    too_long: AtomicU64,
    overlap_rejected: AtomicU64,
    queues_expired: AtomicU64,
    queues_evicted: AtomicU64,
    queues_drained: AtomicU64,
}

macro_rules! bump {
    ($name:ident) => {
        pub(crate) fn $name(&self) {
            self.$name.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl ReassemblyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_drop(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::ZeroLength => &self.zero_length,
            DropReason::Duplicate => &self.duplicates,
            DropReason::QueueLimit => &self.queue_limit,
            DropReason::FragmentLimit => &self.fragment_limit,
            DropReason::InconsistentHeader => &self.bad_fragments,
            DropReason::NoMemory => &self.no_memory,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self, err: ReassemblyError) {
        match err {
            ReassemblyError::TooLong => self.too_long.fetch_add(1, Ordering::Relaxed),
            ReassemblyError::Overlap => self.overlap_rejected.fetch_add(1, Ordering::Relaxed),
        };
    }

    bump!(fragments);
    bump!(reassembled);
    bump!(queues_expired);
    bump!(queues_evicted);
    bump!(queues_drained);

    pub fn snapshot(&self) -> ReassemblyStatsSnapshot {
        ReassemblyStatsSnapshot {
            fragments: self.fragments.load(Ordering::Relaxed),
            reassembled: self.reassembled.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            zero_length: self.zero_length.load(Ordering::Relaxed),
            queue_limit: self.queue_limit.load(Ordering::Relaxed),
            fragment_limit: self.fragment_limit.load(Ordering::Relaxed),
            no_memory: self.no_memory.load(Ordering::Relaxed),
            bad_fragments: self.bad_fragments.load(Ordering::Relaxed),
            too_long: self.too_long.load(Ordering::Relaxed),
            overlap_rejected: self.overlap_rejected.load(Ordering::Relaxed),
            queues_expired: self.queues_expired.load(Ordering::Relaxed),
            queues_evicted: self.queues_evicted.load(Ordering::Relaxed),
            queues_drained: self.queues_drained.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [ReassemblyStats]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassemblyStatsSnapshot {
    pub fragments: u64,
    pub reassembled: u64,
    pub duplicates: u64,
    pub zero_length: u64,
    pub queue_limit: u64,
    pub fragment_limit: u64,
    pub no_memory: u64,
    pub bad_fragments: u64,
    pub too_long: u64,
    pub overlap_rejected: u64,
    pub queues_expired: u64,
    pub queues_evicted: u64,
    pub queues_drained: u64,
}

impl ReassemblyStatsSnapshot {
    /// Every fragment that was discarded for any reason
    pub fn dropped(&self) -> u64 {
        self.duplicates
            + self.zero_length
            + self.queue_limit
            + self.fragment_limit
            + self.no_memory
            + self.bad_fragments
    }
}
