use super::*;

/// Why a fragment was discarded without an upward signal
#[derive(ThisError, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DropReason {
    #[error("zero-length fragment")]
    ZeroLength,
    #[error("fragment already covered by buffered data")]
    Duplicate,
    #[error("reassembly queue limit reached")]
    QueueLimit,
    #[error("buffered fragment limit reached")]
    FragmentLimit,
    #[error("header inconsistent with earlier fragments")]
    InconsistentHeader,
    #[error("out of memory")]
    NoMemory,
}

/// Fatal reassembly conditions, these raise a sink signal
#[derive(ThisError, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReassemblyError {
    #[error("reassembled datagram would exceed the maximum size")]
    TooLong,
    #[error("fragment overlaps buffered data")]
    Overlap,
}

#[derive(ThisError, Debug, Copy, Clone, PartialEq, Eq)]
#[error("reassembly table busy")]
pub struct ReassemblyBusyError;

/// Result of feeding one fragment to an engine
#[must_use]
#[derive(Debug)]
pub enum ReassemblyOutcome<T> {
    Incomplete,
    Complete(T),
    Dropped(DropReason),
    Error(ReassemblyError),
}

impl<T> ReassemblyOutcome<T> {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped(_))
    }
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
    pub fn map<X, F: FnOnce(T) -> X>(self, f: F) -> ReassemblyOutcome<X> {
        match self {
            Self::Incomplete => ReassemblyOutcome::<X>::Incomplete,
            Self::Complete(v) => ReassemblyOutcome::<X>::Complete(f(v)),
            Self::Dropped(r) => ReassemblyOutcome::<X>::Dropped(r),
            Self::Error(e) => ReassemblyOutcome::<X>::Error(e),
        }
    }
    pub fn complete(self) -> Option<T> {
        match self {
            Self::Complete(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> fmt::Display for ReassemblyOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete => write!(f, "Incomplete"),
            Self::Complete(_) => write!(f, "Complete"),
            Self::Dropped(r) => write!(f, "Dropped({})", r),
            Self::Error(e) => write!(f, "Error({})", e),
        }
    }
}

/////////////////////////////////////////////////////////

/// A fully reassembled datagram
///
/// `payload` holds the fragmentable part only. The caller rebuilds the
/// unfragmentable header from the first fragment's packet, using
/// `unfragmentable_len` and `next_header`.
#[derive(Debug)]
pub struct Reassembled<B> {
    pub key: FragmentKey,
    pub payload: B,
    pub unfragmentable_len: u16,
    pub next_header: u8,
    pub traffic_class: u8,
    pub fragment_count: u32,
}

impl<B: PacketBuffer> Reassembled<B> {
    /// Wrap a datagram that never needed reassembly
    pub fn unfragmented(key: FragmentKey, info: FirstFragmentInfo, payload: B) -> Self {
        Self {
            key,
            payload,
            unfragmentable_len: info.unfragmentable_len,
            next_header: info.next_header,
            traffic_class: key.traffic_class(),
            fragment_count: 1,
        }
    }

    /// Length of the whole datagram including the unfragmentable part
    pub fn total_len(&self) -> usize {
        self.unfragmentable_len as usize + self.payload.len()
    }
}

/////////////////////////////////////////////////////////

/// Header fields that can never describe a valid fragment
#[derive(ThisError, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MalformedFragment {
    #[error("header length {header_len} exceeds total length {total_len}")]
    BadHeaderLength { header_len: u16, total_len: u16 },
    #[error("payload has {actual} bytes, header claims {expected}")]
    Truncated { expected: u32, actual: u32 },
    #[error("fragment carries no payload")]
    Empty,
    #[error("non-final fragment length {0} is not a multiple of 8")]
    Misaligned(u32),
    #[error("engine reassembles {0}")]
    WrongFamily(ProtocolFamily),
}
