use super::*;

/// Header metadata only the offset-zero fragment carries
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FirstFragmentInfo {
    /// Bytes in front of the fragmentable part (IPv4 header, IPv6 extension headers)
    pub unfragmentable_len: u16,
    /// Protocol of the reassembled payload
    pub next_header: u8,
}

/// One arrived fragment
///
/// The length always equals the payload length, and `end()` is exact. An
/// entry ending past `u32::MAX` can be built but no queue will store it.
/// Offsets are measured from the start of the fragmentable part.
#[derive(Debug)]
pub struct FragmentEntry<B> {
    offset: u32,
    length: u64,
    more_fragments: bool,
    first: Option<FirstFragmentInfo>,
    payload: B,
}

impl<B: PacketBuffer> FragmentEntry<B> {
    pub fn new(offset: u32, more_fragments: bool, payload: B) -> Self {
        let length = payload.len() as u64;
        Self {
            offset,
            length,
            more_fragments,
            first: None,
            payload,
        }
    }

    pub fn with_first_info(mut self, info: FirstFragmentInfo) -> Self {
        self.first = Some(info);
        self
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }
    pub fn length(&self) -> u64 {
        self.length
    }
    /// One past the last byte
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + self.length
    }
    pub fn more_fragments(&self) -> bool {
        self.more_fragments
    }
    pub fn is_first(&self) -> bool {
        self.offset == 0
    }
    pub fn first_info(&self) -> Option<FirstFragmentInfo> {
        self.first
    }
    pub fn payload(&self) -> &B {
        &self.payload
    }
    pub fn into_payload(self) -> B {
        self.payload
    }

    /// Drop `count` leading bytes, advancing the offset
    ///
    /// The new offset stays below `end()`, which queues keep within `u32`.
    pub(crate) fn trim_front(&mut self, count: u64) {
        debug_assert!(count < self.length, "trim would empty the fragment");
        self.payload.trim_front(count as usize);
        self.offset = (u64::from(self.offset) + count) as u32;
        self.length -= count;
    }
}
