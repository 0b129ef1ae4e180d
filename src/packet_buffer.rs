//! Byte containers the reassembly core can splice without looking inside
//!
//! * [PacketBuffer] is the only contract the core needs from a payload.
//! * [BytesMut] trims and splits in place and rejoins adjacent halves for free.
//! * [BufferChain] is a chain of [Bytes] segments that concatenates without
//!   copying, the way a network stack links buffer clusters.

use super::*;

use bytes::{Buf, Bytes, BytesMut};

pub trait PacketBuffer {
    /// Total number of payload bytes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard `count` bytes from the front
    fn trim_front(&mut self, count: usize);

    /// Append all of `other` after the last byte of `self`
    fn concat(&mut self, other: Self)
    where
        Self: Sized;

    /// Keep `[0, at)` and return `[at, len)`
    fn split_off(&mut self, at: usize) -> Self
    where
        Self: Sized;
}

/// Plain vectors work everywhere but trimming the front moves the tail
impl PacketBuffer for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn trim_front(&mut self, count: usize) {
        let count = count.min(Vec::len(self));
        self.drain(..count);
    }

    fn concat(&mut self, mut other: Self) {
        self.append(&mut other);
    }

    fn split_off(&mut self, at: usize) -> Self {
        Vec::split_off(self, at.min(Vec::len(self)))
    }
}

impl PacketBuffer for BytesMut {
    fn len(&self) -> usize {
        BytesMut::len(self)
    }

    fn trim_front(&mut self, count: usize) {
        let count = count.min(BytesMut::len(self));
        self.advance(count);
    }

    fn concat(&mut self, other: Self) {
        // O(1) when `other` was split off the end of `self`
        self.unsplit(other);
    }

    fn split_off(&mut self, at: usize) -> Self {
        BytesMut::split_off(self, at.min(BytesMut::len(self)))
    }
}

/////////////////////////////////////////////////////////

/// Chain of shared byte segments
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferChain {
    segments: VecDeque<Bytes>,
    len: usize,
}

impl BufferChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one segment, empty segments are not stored
    pub fn push_segment<S: Into<Bytes>>(&mut self, segment: S) {
        let segment = segment.into();
        if segment.is_empty() {
            return;
        }
        self.len += segment.len();
        self.segments.push_back(segment);
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> impl Iterator<Item = &[u8]> {
        self.segments.iter().map(|s| &s[..])
    }

    /// Flatten into one contiguous vector
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for s in &self.segments {
            out.extend_from_slice(s);
        }
        out
    }
}

impl From<Bytes> for BufferChain {
    fn from(segment: Bytes) -> Self {
        let mut chain = Self::new();
        chain.push_segment(segment);
        chain
    }
}

impl From<Vec<u8>> for BufferChain {
    fn from(segment: Vec<u8>) -> Self {
        Self::from(Bytes::from(segment))
    }
}

impl PacketBuffer for BufferChain {
    fn len(&self) -> usize {
        self.len
    }

    fn trim_front(&mut self, mut count: usize) {
        while count > 0 {
            let Some(front) = self.segments.front_mut() else {
                break;
            };
            if front.len() <= count {
                count -= front.len();
                self.len -= front.len();
                self.segments.pop_front();
            } else {
                front.advance(count);
                self.len -= count;
                count = 0;
            }
        }
    }

    fn concat(&mut self, other: Self) {
        self.len += other.len;
        self.segments.extend(other.segments);
    }

    fn split_off(&mut self, at: usize) -> Self {
        let mut tail = BufferChain::new();
        if at >= self.len {
            return tail;
        }

        // Find the segment holding byte `at`
        let mut seen = 0usize;
        let mut idx = 0usize;
        while idx < self.segments.len() {
            let seg_len = self.segments[idx].len();
            if seen + seg_len > at {
                break;
            }
            seen += seg_len;
            idx += 1;
        }

        let mut rest = self.segments.split_off(idx);
        if let Some(first) = rest.front_mut() {
            let keep = at - seen;
            if keep > 0 {
                // Both halves share the segment's storage
                let kept = first.split_to(keep);
                self.segments.push_back(kept);
            }
        }
        for s in rest {
            tail.push_segment(s);
        }
        self.len = at;
        tail
    }
}
