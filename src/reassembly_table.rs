use super::*;

/// Derived limits are this fraction of the memory budget
pub const BUDGET_LIMIT_DIVISOR: u32 = 4;

/// Effective admission limits, `-1` is unlimited and `0` admits nothing
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassemblyLimits {
    pub max_fragments: i32,
    pub max_queues: i32,
}

fn limit_reached(count: u32, max: i32) -> bool {
    max >= 0 && count >= max as u32
}

fn limit_exceeded(count: u32, max: i32) -> bool {
    max >= 0 && count > max as u32
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum EvictReason {
    Expired,
    Pressure,
    Drained,
}

/////////////////////////////////////////////////////////

/// Hash-bucketed reassembly queues with global accounting
///
/// Not synchronized. [ReassemblyEngine] wraps one in a mutex.
pub struct ReassemblyTable<B> {
    policy: ProtocolPolicy,
    stats: Arc<ReassemblyStats>,
    buckets: Vec<Vec<ReassemblyQueue<B>>>,
    bucket_mask: usize,
    total_fragment_count: u32,
    total_queue_count: u32,
    limits: ReassemblyLimits,
    budget_clusters: Option<u32>,
    drop_scan_index: usize,
}

impl<B: PacketBuffer> ReassemblyTable<B> {
    pub fn new(policy: ProtocolPolicy, stats: Arc<ReassemblyStats>, clusters: u32) -> Self {
        let bucket_count = policy.hash_buckets.max(1).next_power_of_two();
        let mut buckets = Vec::with_capacity(bucket_count);
        buckets.resize_with(bucket_count, Vec::new);
        let mut table = Self {
            policy,
            stats,
            buckets,
            bucket_mask: bucket_count - 1,
            total_fragment_count: 0,
            total_queue_count: 0,
            limits: ReassemblyLimits {
                max_fragments: 0,
                max_queues: 0,
            },
            budget_clusters: None,
            drop_scan_index: 0,
        };
        table.refresh_limits(clusters);
        table
    }

    pub fn policy(&self) -> &ProtocolPolicy {
        &self.policy
    }
    pub fn limits(&self) -> ReassemblyLimits {
        self.limits
    }
    pub fn fragment_count(&self) -> u32 {
        self.total_fragment_count
    }
    pub fn queue_count(&self) -> u32 {
        self.total_queue_count
    }
    pub fn queues(&self) -> impl Iterator<Item = &ReassemblyQueue<B>> {
        self.buckets.iter().flatten()
    }
    pub fn find(&self, key: &FragmentKey) -> Option<&ReassemblyQueue<B>> {
        self.buckets[key.bucket_index(self.bucket_mask)]
            .iter()
            .find(|q| q.key() == key)
    }

    /// Re-derive the limits if the memory budget changed
    pub fn refresh_limits(&mut self, clusters: u32) {
        if self.budget_clusters == Some(clusters) {
            return;
        }
        self.budget_clusters = Some(clusters);
        let derived = i32::try_from(clusters / BUDGET_LIMIT_DIVISOR).unwrap_or(i32::MAX);
        self.limits = ReassemblyLimits {
            max_fragments: self.policy.max_fragments.unwrap_or(derived),
            max_queues: self.policy.max_queues.unwrap_or(derived),
        };
        log_frag!(debug
            "{} limits: {} fragments, {} queues ({} clusters)",
            self.policy.family,
            self.limits.max_fragments,
            self.limits.max_queues,
            clusters
        );
    }

    pub(crate) fn submit(
        &mut self,
        key: FragmentKey,
        entry: FragmentEntry<B>,
        clusters: u32,
        events: &mut Vec<ReassemblyEvent<B>>,
    ) -> ReassemblyOutcome<Reassembled<B>> {
        self.stats.fragments();
        self.refresh_limits(clusters);

        if entry.length() == 0 {
            return self.dropped(&key, DropReason::ZeroLength);
        }

        if limit_reached(self.total_fragment_count, self.limits.max_fragments) {
            if self.policy.eviction_policy == EvictionPolicy::Aimd {
                self.drop_half(events);
            }
            if limit_reached(self.total_fragment_count, self.limits.max_fragments) {
                return self.dropped(&key, DropReason::FragmentLimit);
            }
        }

        let bucket = key.bucket_index(self.bucket_mask);
        let index = match self.buckets[bucket].iter().position(|q| q.key() == &key) {
            Some(index) => index,
            None => {
                // The queue limit only applies to new datagrams
                if limit_reached(self.total_queue_count, self.limits.max_queues) {
                    return self.dropped(&key, DropReason::QueueLimit);
                }
                if self.buckets[bucket].try_reserve(1).is_err() {
                    return self.dropped(&key, DropReason::NoMemory);
                }
                self.buckets[bucket].push(ReassemblyQueue::new(key, self.policy.default_ttl));
                self.total_queue_count += 1;
                self.buckets[bucket].len() - 1
            }
        };

        let mut oversized = Vec::new();
        let queue = &mut self.buckets[bucket][index];
        let before = queue.fragment_count();
        let result = queue.insert(entry, key.traffic_class(), &self.policy, &mut oversized);
        let after = queue.fragment_count();
        self.total_fragment_count = self.total_fragment_count - before + after;

        for fragment in oversized {
            self.stats.record_error(ReassemblyError::TooLong);
            log_frag!(debug
                "{}: buffered fragment at {} exceeds maximum size",
                key,
                fragment.offset()
            );
            events.push(ReassemblyEvent::TooLong {
                key,
                fragment: fragment.into_payload(),
            });
        }

        let outcome = match result {
            Ok(InsertStatus::Incomplete) => {
                log_frag!("{}: {} fragments buffered", key, after);
                ReassemblyOutcome::Incomplete
            }
            Ok(InsertStatus::Complete { total_len }) => {
                return self.complete(bucket, index, total_len, events);
            }
            Err(InsertError::Contained(_)) => self.dropped(&key, DropReason::Duplicate),
            Err(InsertError::Inconsistent(_)) => {
                self.dropped(&key, DropReason::InconsistentHeader)
            }
            Err(InsertError::NoMemory(_)) => self.dropped(&key, DropReason::NoMemory),
            Err(InsertError::Overlap(entry)) => {
                self.rejected(key, entry, ReassemblyError::Overlap, events)
            }
            Err(InsertError::TooLong(entry)) => {
                self.rejected(key, entry, ReassemblyError::TooLong, events)
            }
        };

        if self.buckets[bucket][index].fragment_count() == 0 {
            self.remove_queue(bucket, index);
        }
        outcome
    }

    fn dropped<T>(&self, key: &FragmentKey, reason: DropReason) -> ReassemblyOutcome<T> {
        self.stats.record_drop(reason);
        log_frag!(debug "{}: dropped fragment: {}", key, reason);
        ReassemblyOutcome::Dropped(reason)
    }

    fn rejected<T>(
        &self,
        key: FragmentKey,
        entry: FragmentEntry<B>,
        err: ReassemblyError,
        events: &mut Vec<ReassemblyEvent<B>>,
    ) -> ReassemblyOutcome<T> {
        self.stats.record_error(err);
        log_frag!(debug
            "{}: rejected fragment [{}, {}): {}",
            key,
            entry.offset(),
            entry.end(),
            err
        );
        let fragment = entry.into_payload();
        events.push(match err {
            ReassemblyError::Overlap => ReassemblyEvent::OverlapRejected { key, fragment },
            ReassemblyError::TooLong => ReassemblyEvent::TooLong { key, fragment },
        });
        ReassemblyOutcome::Error(err)
    }

    fn complete(
        &mut self,
        bucket: usize,
        index: usize,
        total_len: u64,
        events: &mut Vec<ReassemblyEvent<B>>,
    ) -> ReassemblyOutcome<Reassembled<B>> {
        let queue = self.remove_queue(bucket, index);
        let key = *queue.key();
        let unfragmentable = queue.unfragmentable_len().max(0) as u64;

        if unfragmentable + total_len > u64::from(self.policy.max_datagram_size) {
            self.stats.record_error(ReassemblyError::TooLong);
            log_frag!(debug
                "{}: reassembled size {} exceeds maximum",
                key,
                unfragmentable + total_len
            );
            if let Some(fragment) = queue.into_first_fragment() {
                events.push(ReassemblyEvent::TooLong { key, fragment });
            }
            return ReassemblyOutcome::Error(ReassemblyError::TooLong);
        }

        // A complete queue always holds at least one fragment
        queue
            .into_reassembled()
            .map_or(ReassemblyOutcome::Incomplete, |packet| {
                self.stats.reassembled();
                log_frag!(
                    "{}: reassembled {} bytes from {} fragments",
                    key,
                    total_len,
                    packet.fragment_count
                );
                ReassemblyOutcome::Complete(packet)
            })
    }

    fn remove_queue(&mut self, bucket: usize, index: usize) -> ReassemblyQueue<B> {
        let queue = self.buckets[bucket].remove(index);
        self.total_queue_count -= 1;
        self.total_fragment_count -= queue.fragment_count();
        queue
    }

    fn release(
        &self,
        queue: ReassemblyQueue<B>,
        reason: EvictReason,
        events: &mut Vec<ReassemblyEvent<B>>,
    ) {
        match reason {
            EvictReason::Expired => {
                self.stats.queues_expired();
                log_frag!(debug
                    "{}: expired with {} fragments",
                    queue.key(),
                    queue.fragment_count()
                );
                if self.policy.report_time_exceeded {
                    let key = *queue.key();
                    events.push(ReassemblyEvent::TimeExceeded {
                        key,
                        first_fragment: queue.into_first_fragment(),
                    });
                }
            }
            EvictReason::Pressure => {
                self.stats.queues_evicted();
                log_frag!(debug
                    "{}: evicted with {} fragments",
                    queue.key(),
                    queue.fragment_count()
                );
            }
            EvictReason::Drained => {
                self.stats.queues_drained();
            }
        }
    }

    /// Age every queue, evicting those that reach zero
    ///
    /// Returns the eviction count and the TTL at or below which the older
    /// half of the remaining fragments sit.
    fn decrement_ttl(
        &mut self,
        ticks: u32,
        reason: EvictReason,
        events: &mut Vec<ReassemblyEvent<B>>,
    ) -> (usize, u32) {
        let mut histogram = [0u32; u8::MAX as usize + 1];
        let mut remaining = 0u32;
        let mut evicted = 0usize;

        for bucket in 0..self.buckets.len() {
            let mut n = 0;
            while n < self.buckets[bucket].len() {
                let ttl = self.buckets[bucket][n].age(ticks);
                if ttl == 0 {
                    let queue = self.remove_queue(bucket, n);
                    self.release(queue, reason, events);
                    evicted += 1;
                } else {
                    let count = self.buckets[bucket][n].fragment_count();
                    histogram[ttl as usize] += count;
                    remaining += count;
                    n += 1;
                }
            }
        }
        debug_assert_eq!(remaining, self.total_fragment_count);
        debug_assert_eq!(
            self.buckets.iter().map(|b| b.len()).sum::<usize>(),
            self.total_queue_count as usize
        );

        // Oldest first, until at least half of the fragments are covered
        let drop = remaining - remaining / 2;
        let mut cumulative = 0u32;
        let mut median = 0u32;
        for (ttl, count) in histogram.iter().enumerate() {
            cumulative += count;
            if cumulative >= drop {
                median = ttl as u32;
                break;
            }
        }
        (evicted, median)
    }

    /// Evict the older half of the buffered fragments
    ///
    /// Every queue whose TTL is at or below the fragment-weighted median goes.
    pub(crate) fn drop_half(&mut self, events: &mut Vec<ReassemblyEvent<B>>) -> usize {
        let (_, median) = self.decrement_ttl(0, EvictReason::Pressure, events);
        let (evicted, _) = self.decrement_ttl(median, EvictReason::Pressure, events);
        log_frag!(debug
            "{} pressure eviction at ttl {}: {} queues, {} fragments left",
            self.policy.family,
            median,
            evicted,
            self.total_fragment_count
        );
        evicted
    }

    /// Free whole buckets, resuming where the last scan stopped
    fn enforce_queue_limit(&mut self, events: &mut Vec<ReassemblyEvent<B>>) -> usize {
        let mut evicted = 0;
        let mut scanned = 0;
        while scanned < self.buckets.len()
            && limit_exceeded(self.total_queue_count, self.limits.max_queues)
        {
            let bucket = self.drop_scan_index;
            while !self.buckets[bucket].is_empty() {
                let queue = self.remove_queue(bucket, 0);
                self.release(queue, EvictReason::Pressure, events);
                evicted += 1;
            }
            self.drop_scan_index = (bucket + 1) & self.bucket_mask;
            scanned += 1;
        }
        evicted
    }

    pub(crate) fn age_by_ticks(
        &mut self,
        ticks: u32,
        clusters: u32,
        events: &mut Vec<ReassemblyEvent<B>>,
    ) -> usize {
        self.refresh_limits(clusters);
        let (mut evicted, _) = self.decrement_ttl(ticks, EvictReason::Expired, events);
        if limit_exceeded(self.total_fragment_count, self.limits.max_fragments) {
            evicted += self.drop_half(events);
        }
        if limit_exceeded(self.total_queue_count, self.limits.max_queues) {
            evicted += self.enforce_queue_limit(events);
        }
        evicted
    }

    /// Evict every queue without raising signals
    pub(crate) fn drain_all(&mut self) -> usize {
        let mut drained = 0;
        let mut events = Vec::new();
        for bucket in 0..self.buckets.len() {
            while !self.buckets[bucket].is_empty() {
                let queue = self.remove_queue(bucket, 0);
                self.release(queue, EvictReason::Drained, &mut events);
                drained += 1;
            }
        }
        debug_assert!(events.is_empty());
        debug_assert_eq!(self.total_fragment_count, 0);
        debug_assert_eq!(self.total_queue_count, 0);
        if drained > 0 {
            log_frag!(debug "{} drained {} queues", self.policy.family, drained);
        }
        drained
    }
}
