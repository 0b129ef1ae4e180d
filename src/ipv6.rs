use super::*;

/// The IPv6 fields reassembly looks at, already decoded
///
/// `unfragmentable_len` counts the extension headers between the fixed
/// header and the fragment header. `fragment_len` counts the bytes after the
/// fragment header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ipv6FragmentHeader {
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub identification: u32,
    pub traffic_class: u8,
    /// Next header field of the fragment header
    pub next_header: u8,
    pub unfragmentable_len: u16,
    /// Fragment offset in 8-byte units
    pub fragment_offset: u16,
    pub more_fragments: bool,
    pub fragment_len: u16,
}

impl Ipv6FragmentHeader {
    /// Offset zero with no more fragments (RFC 6946)
    pub fn is_atomic(&self) -> bool {
        self.fragment_offset == 0 && !self.more_fragments
    }

    pub fn key(&self) -> FragmentKey {
        FragmentKey::v6(self.src, self.dst, self.identification, self.traffic_class)
    }

    /// Validate the header against `payload` and build the fragment entry
    ///
    /// `payload` starts right after the fragment header.
    pub fn prepare<B: PacketBuffer>(&self, mut payload: B) -> Result<FragmentEntry<B>, MalformedFragment> {
        let flen = u32::from(self.fragment_len);
        let have = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        if have < flen {
            return Err(MalformedFragment::Truncated {
                expected: flen,
                actual: have,
            });
        }
        if have > flen {
            drop(payload.split_off(flen as usize));
        }

        if flen == 0 && !self.is_atomic() {
            return Err(MalformedFragment::Empty);
        }
        if self.more_fragments && (flen & 0x7) != 0 {
            return Err(MalformedFragment::Misaligned(flen));
        }

        let offset = u32::from(self.fragment_offset) << 3;
        let entry = FragmentEntry::new(offset, self.more_fragments, payload);
        if offset == 0 {
            return Ok(entry.with_first_info(FirstFragmentInfo {
                unfragmentable_len: self.unfragmentable_len,
                next_header: self.next_header,
            }));
        }
        Ok(entry)
    }
}

impl<B: PacketBuffer> ReassemblyEngine<B> {
    /// Feed a decoded IPv6 fragment
    ///
    /// Atomic fragments come straight back as complete without touching the
    /// table, so they can never collide with a real reassembly.
    pub fn submit_ipv6(
        &self,
        header: &Ipv6FragmentHeader,
        payload: B,
    ) -> Result<ReassemblyOutcome<Reassembled<B>>, MalformedFragment> {
        if self.policy().family != ProtocolFamily::V6 {
            return Err(MalformedFragment::WrongFamily(self.policy().family));
        }
        let entry = header.prepare(payload)?;
        if header.is_atomic() {
            let info = entry.first_info().unwrap_or_default();
            return Ok(ReassemblyOutcome::Complete(Reassembled::unfragmented(
                header.key(),
                info,
                entry.into_payload(),
            )));
        }
        Ok(self.submit_fragment(header.key(), entry))
    }

    /// Feed a decoded IPv6 fragment, handing completed datagrams to the sink
    pub fn input_ipv6(
        &self,
        header: &Ipv6FragmentHeader,
        payload: B,
    ) -> Result<ReassemblyOutcome<()>, MalformedFragment> {
        Ok(self.deliver(self.submit_ipv6(header, payload)?))
    }
}
