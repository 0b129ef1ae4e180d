use super::*;
use range_set_blaze::RangeSetBlaze;

const ECN_MASK: u8 = 0x03;
const ECN_NOT_ECT: u8 = 0x00;
const ECN_CE: u8 = 0x03;

/// Stored fragments must end inside the 32-bit offset space
const MAX_FRAGMENT_END: u64 = u32::MAX as u64;

/// Queue state after a successful insert
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum InsertStatus {
    Incomplete,
    Complete { total_len: u64 },
}

/// Reasons an insert left the queue untouched, carrying the fragment back
#[derive(Debug)]
pub(crate) enum InsertError<B> {
    Contained(FragmentEntry<B>),
    Inconsistent(FragmentEntry<B>),
    NoMemory(FragmentEntry<B>),
    Overlap(FragmentEntry<B>),
    TooLong(FragmentEntry<B>),
}

/// Fragments of one datagram, ordered by offset and pairwise disjoint
#[derive(Debug)]
pub struct ReassemblyQueue<B> {
    key: FragmentKey,
    entries: Vec<FragmentEntry<B>>,
    coverage: RangeSetBlaze<u32>,
    ttl_ticks: u8,
    unfragmentable_len: i32,
    next_header: u8,
    traffic_class: u8,
}

impl<B: PacketBuffer> ReassemblyQueue<B> {
    pub(crate) fn new(key: FragmentKey, ttl_ticks: u8) -> Self {
        Self {
            key,
            entries: Vec::new(),
            coverage: RangeSetBlaze::new(),
            ttl_ticks,
            unfragmentable_len: -1,
            next_header: 0,
            traffic_class: key.traffic_class(),
        }
    }

    pub fn key(&self) -> &FragmentKey {
        &self.key
    }
    pub fn ttl_ticks(&self) -> u8 {
        self.ttl_ticks
    }
    pub fn fragment_count(&self) -> u32 {
        self.entries.len() as u32
    }
    pub fn first_fragment_seen(&self) -> bool {
        self.unfragmentable_len >= 0
    }
    /// `-1` until the offset-zero fragment has been accepted
    pub fn unfragmentable_len(&self) -> i32 {
        self.unfragmentable_len
    }
    pub fn next_header(&self) -> u8 {
        self.next_header
    }
    pub fn traffic_class(&self) -> u8 {
        self.traffic_class
    }
    pub fn entries(&self) -> impl Iterator<Item = &FragmentEntry<B>> {
        self.entries.iter()
    }
    /// Covered byte ranges as `(start, end)` pairs, end exclusive
    pub fn covered(&self) -> Vec<(u32, u32)> {
        self.coverage
            .ranges()
            .map(|r| (*r.start(), *r.end() + 1))
            .collect()
    }

    fn unfragmentable_or_zero(&self) -> u64 {
        self.unfragmentable_len.max(0) as u64
    }

    /// Subtract `ticks` from the TTL, returning what is left
    pub(crate) fn age(&mut self, ticks: u32) -> u8 {
        self.ttl_ticks = u32::from(self.ttl_ticks).saturating_sub(ticks) as u8;
        self.ttl_ticks
    }

    fn traffic_class_compatible(&mut self, traffic_class: u8, check: TrafficClassCheck) -> bool {
        match check {
            TrafficClassCheck::None => true,
            TrafficClassCheck::Exact => traffic_class == self.traffic_class,
            TrafficClassCheck::Ecn => {
                let ecn = traffic_class & ECN_MASK;
                let ecn0 = self.traffic_class & ECN_MASK;
                if ecn == ECN_CE {
                    if ecn0 == ECN_NOT_ECT {
                        return false;
                    }
                    // CE on any fragment marks the whole datagram
                    self.traffic_class |= ECN_CE;
                    return true;
                }
                !(ecn == ECN_NOT_ECT && ecn0 != ECN_NOT_ECT)
            }
        }
    }

    /// Insert one fragment
    ///
    /// On success the fragment has been stored, possibly trimmed, and any
    /// fully covered successors have been released. Members that become
    /// oversized once the unfragmentable length is known are moved to
    /// `oversized`.
    pub(crate) fn insert(
        &mut self,
        mut entry: FragmentEntry<B>,
        traffic_class: u8,
        policy: &ProtocolPolicy,
        oversized: &mut Vec<FragmentEntry<B>>,
    ) -> Result<InsertStatus, InsertError<B>> {
        debug_assert!(entry.length() > 0, "zero-length fragment reached the queue");

        // No datagram can reach this far whatever the oversize policy
        if entry.end() > MAX_FRAGMENT_END {
            return Err(InsertError::TooLong(entry));
        }

        if !self.traffic_class_compatible(traffic_class, policy.traffic_class_check) {
            return Err(InsertError::Inconsistent(entry));
        }

        let is_first = entry.is_first();
        let unfragmentable = if is_first && !self.first_fragment_seen() {
            entry
                .first_info()
                .map(|i| u64::from(i.unfragmentable_len))
                .unwrap_or(0)
        } else {
            self.unfragmentable_or_zero()
        };
        if policy.oversize_check == OversizeCheck::Incremental
            && unfragmentable + entry.end() > u64::from(policy.max_datagram_size)
        {
            return Err(InsertError::TooLong(entry));
        }

        if self.entries.try_reserve(1).is_err() {
            return Err(InsertError::NoMemory(entry));
        }

        // First stored fragment starting after this one
        let mut idx = self
            .entries
            .partition_point(|e| e.offset() <= entry.offset());

        if policy.strict_overlap {
            if idx > 0 {
                let prev = &self.entries[idx - 1];
                if prev.offset() == entry.offset() && prev.end() == entry.end() {
                    return Err(InsertError::Contained(entry));
                }
            }
            if !self.coverage.is_disjoint(&Self::span(&entry)) {
                return Err(InsertError::Overlap(entry));
            }
        } else {
            if idx > 0 {
                let prev_end = self.entries[idx - 1].end();
                if prev_end > u64::from(entry.offset()) {
                    let overlap = prev_end - u64::from(entry.offset());
                    if overlap >= entry.length() {
                        return Err(InsertError::Contained(entry));
                    }
                    entry.trim_front(overlap);
                }
            }
            while idx < self.entries.len() {
                let end = entry.end();
                let succ = &mut self.entries[idx];
                if end <= u64::from(succ.offset()) {
                    break;
                }
                let trim = end - u64::from(succ.offset());
                if trim < succ.length() {
                    succ.trim_front(trim);
                    break;
                }
                // Fully covered by the new fragment
                self.entries.remove(idx);
            }
            // Trimming keeps `idx` as the insertion point
            debug_assert!(idx == 0 || self.entries[idx - 1].end() <= u64::from(entry.offset()));
        }

        self.coverage |= Self::span(&entry);
        let first_info = entry.first_info();
        self.entries.insert(idx, entry);

        if is_first && !self.first_fragment_seen() {
            let info = first_info.unwrap_or_default();
            self.unfragmentable_len = i32::from(info.unfragmentable_len);
            self.next_header = info.next_header;

            if policy.oversize_check == OversizeCheck::Incremental {
                self.sweep_oversized(policy.max_datagram_size, oversized);
            }
        }

        Ok(self.completion())
    }

    /// Covered bytes of an entry already checked against `MAX_FRAGMENT_END`
    fn span(entry: &FragmentEntry<B>) -> RangeSetBlaze<u32> {
        RangeSetBlaze::from_iter([entry.offset()..=(entry.end() - 1) as u32])
    }

    /// Remove members that end beyond the limit now that the header size is known
    fn sweep_oversized(&mut self, max_datagram_size: u32, oversized: &mut Vec<FragmentEntry<B>>) {
        let unfragmentable = self.unfragmentable_or_zero();
        let before = oversized.len();
        let mut n = 0;
        while n < self.entries.len() {
            if unfragmentable + self.entries[n].end() > u64::from(max_datagram_size) {
                oversized.push(self.entries.remove(n));
            } else {
                n += 1;
            }
        }
        if oversized.len() != before {
            self.coverage = self
                .entries
                .iter()
                .map(|e| e.offset()..=(e.end() - 1) as u32)
                .collect();
        }
    }

    fn completion(&self) -> InsertStatus {
        let mut next = 0u64;
        for e in &self.entries {
            if u64::from(e.offset()) != next {
                return InsertStatus::Incomplete;
            }
            next += e.length();
        }
        match self.entries.last() {
            Some(last) if !last.more_fragments() => {
                debug_assert_eq!(self.coverage.ranges_len(), 1);
                InsertStatus::Complete { total_len: next }
            }
            _ => InsertStatus::Incomplete,
        }
    }

    /// Concatenate the payloads in offset order
    pub(crate) fn into_reassembled(self) -> Option<Reassembled<B>> {
        let fragment_count = self.fragment_count();
        let unfragmentable_len = self.unfragmentable_or_zero() as u16;
        let mut entries = self.entries.into_iter();
        let mut payload = entries.next()?.into_payload();
        for e in entries {
            payload.concat(e.into_payload());
        }
        Some(Reassembled {
            key: self.key,
            payload,
            unfragmentable_len,
            next_header: self.next_header,
            traffic_class: self.traffic_class,
            fragment_count,
        })
    }

    /// Release everything, handing back the offset-zero fragment's buffer
    pub(crate) fn into_first_fragment(self) -> Option<B> {
        self.entries
            .into_iter()
            .next()
            .filter(|e| e.is_first())
            .map(|e| e.into_payload())
    }
}
