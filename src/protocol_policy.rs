use super::*;
use static_assertions::const_assert;

/// Largest datagram either IP version can describe
pub const IP_MAXPACKET: u32 = 65535;

/// Default number of hash buckets per table
pub const DEFAULT_HASH_BUCKETS: usize = 64;

const_assert!(DEFAULT_HASH_BUCKETS.is_power_of_two());

/// What happens when the global fragment limit is reached
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Evict roughly half of all buffered fragments, oldest first, then admit
    Aimd,
    /// Drop the arriving fragment
    HardCap,
}

/// When the reassembled size limit is enforced
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizeCheck {
    /// On every arrival, rejecting only the offending fragment
    Incremental,
    /// Once the queue is complete, destroying the whole queue
    AtCompletion,
}

/// How the traffic class of later fragments must match the first
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficClassCheck {
    None,
    /// Whole byte must match (IPv4 TOS)
    Exact,
    /// ECN codepoints must be compatible (RFC 3168 section 5.3)
    Ecn,
}

/// What a non-blocking memory pressure drain evicts
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    Half,
    All,
}

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("hash bucket count must be a nonzero power of two: {0}")]
    BucketCount(usize),
    #[error("default ttl must be nonzero")]
    ZeroTtl,
    #[error("tick duration must be nonzero")]
    ZeroTick,
    #[error("{name} limit must be -1 (unlimited) or greater: {value}")]
    Limit { name: &'static str, value: i32 },
    #[error("max datagram size out of range: {0}")]
    DatagramSize(u32),
}

/// Per-protocol reassembly behavior
///
/// `max_fragments` and `max_queues` use `-1` for unlimited and `0` to accept
/// nothing. `None` derives the limit from the memory budget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolPolicy {
    pub family: ProtocolFamily,
    pub strict_overlap: bool,
    pub default_ttl: u8,
    pub tick_duration_ms: u32,
    pub max_datagram_size: u32,
    pub eviction_policy: EvictionPolicy,
    pub oversize_check: OversizeCheck,
    pub traffic_class_check: TrafficClassCheck,
    pub report_time_exceeded: bool,
    pub pressure_drain: DrainMode,
    pub hash_buckets: usize,
    pub max_fragments: Option<i32>,
    pub max_queues: Option<i32>,
}

impl ProtocolPolicy {
    /// Trimming overlap handling, 30 half-second ticks, half-eviction under pressure
    pub fn ipv4() -> Self {
        Self {
            family: ProtocolFamily::V4,
            strict_overlap: false,
            default_ttl: 30,
            tick_duration_ms: 500,
            max_datagram_size: IP_MAXPACKET,
            eviction_policy: EvictionPolicy::Aimd,
            oversize_check: OversizeCheck::Incremental,
            traffic_class_check: TrafficClassCheck::Exact,
            report_time_exceeded: false,
            pressure_drain: DrainMode::Half,
            hash_buckets: DEFAULT_HASH_BUCKETS,
            max_fragments: None,
            max_queues: Some(200),
        }
    }

    /// Overlap rejection, 60 half-second ticks, hard caps
    pub fn ipv6() -> Self {
        Self {
            family: ProtocolFamily::V6,
            strict_overlap: true,
            default_ttl: 60,
            tick_duration_ms: 500,
            max_datagram_size: IP_MAXPACKET,
            eviction_policy: EvictionPolicy::HardCap,
            oversize_check: OversizeCheck::Incremental,
            traffic_class_check: TrafficClassCheck::Ecn,
            report_time_exceeded: true,
            pressure_drain: DrainMode::All,
            hash_buckets: DEFAULT_HASH_BUCKETS,
            max_fragments: None,
            max_queues: None,
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.hash_buckets == 0 || !self.hash_buckets.is_power_of_two() {
            return Err(PolicyError::BucketCount(self.hash_buckets));
        }
        if self.default_ttl == 0 {
            return Err(PolicyError::ZeroTtl);
        }
        if self.tick_duration_ms == 0 {
            return Err(PolicyError::ZeroTick);
        }
        for (name, value) in [
            ("fragment", self.max_fragments),
            ("queue", self.max_queues),
        ] {
            if let Some(value) = value {
                if value < -1 {
                    return Err(PolicyError::Limit { name, value });
                }
            }
        }
        if self.max_datagram_size == 0 || self.max_datagram_size > IP_MAXPACKET {
            return Err(PolicyError::DatagramSize(self.max_datagram_size));
        }
        Ok(())
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_duration_ms))
    }
}
