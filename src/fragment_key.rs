use super::*;

use core::hash::{Hash, Hasher};

/// Address family a reassembly belongs to
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolFamily {
    V4,
    V6,
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolFamily::V4 => write!(f, "ipv4"),
            ProtocolFamily::V6 => write!(f, "ipv6"),
        }
    }
}

/// Identity of one datagram under reassembly
///
/// Two fragments belong to the same reassembly when their family, addresses,
/// identifier and protocol match. The traffic class (IPv4 TOS or IPv6 traffic
/// class) is carried along so the table can check it for consistency, but it
/// does not take part in equality or hashing.
#[derive(Copy, Clone, Debug)]
pub struct FragmentKey {
    family: ProtocolFamily,
    src: IpAddr,
    dst: IpAddr,
    identifier: u32,
    protocol: u8,
    traffic_class: u8,
}

impl FragmentKey {
    pub fn v4(src: Ipv4Addr, dst: Ipv4Addr, identifier: u16, protocol: u8, tos: u8) -> Self {
        Self {
            family: ProtocolFamily::V4,
            src: IpAddr::V4(src),
            dst: IpAddr::V4(dst),
            identifier: identifier as u32,
            protocol,
            traffic_class: tos,
        }
    }

    /// IPv6 reassembly is keyed on addresses and identification only, so the
    /// protocol slot is always zero.
    pub fn v6(src: Ipv6Addr, dst: Ipv6Addr, identifier: u32, traffic_class: u8) -> Self {
        Self {
            family: ProtocolFamily::V6,
            src: IpAddr::V6(src),
            dst: IpAddr::V6(dst),
            identifier,
            protocol: 0,
            traffic_class,
        }
    }

    pub fn family(&self) -> ProtocolFamily {
        self.family
    }
    pub fn src(&self) -> IpAddr {
        self.src
    }
    pub fn dst(&self) -> IpAddr {
        self.dst
    }
    pub fn identifier(&self) -> u32 {
        self.identifier
    }
    pub fn protocol(&self) -> u8 {
        self.protocol
    }
    pub fn traffic_class(&self) -> u8 {
        self.traffic_class
    }

    fn src_low_bits(&self) -> u32 {
        match self.src {
            IpAddr::V4(a) => u32::from(a),
            IpAddr::V6(a) => {
                let o = a.octets();
                u32::from_be_bytes([o[12], o[13], o[14], o[15]])
            }
        }
    }

    /// Bucket index for a table of `mask + 1` buckets
    ///
    /// Mixes two nibbles of the source address with the identifier. IPv6
    /// identifiers are folded to 16 bits first.
    pub fn bucket_index(&self, mask: usize) -> usize {
        let x = self.src_low_bits();
        let id = match self.family {
            ProtocolFamily::V4 => self.identifier,
            ProtocolFamily::V6 => (self.identifier ^ (self.identifier >> 16)) & 0xffff,
        };
        ((((x & 0xf) | (((x >> 8) & 0xf) << 4)) ^ id) as usize) & mask
    }
}

impl PartialEq for FragmentKey {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family
            && self.identifier == other.identifier
            && self.protocol == other.protocol
            && self.src == other.src
            && self.dst == other.dst
    }
}
impl Eq for FragmentKey {}

impl Hash for FragmentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.family.hash(state);
        self.src.hash(state);
        self.dst.hash(state);
        self.identifier.hash(state);
        self.protocol.hash(state);
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} id={:#x} proto={}",
            self.family, self.src, self.dst, self.identifier, self.protocol
        )
    }
}
