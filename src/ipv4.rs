use super::*;

/// The IPv4 header fields reassembly looks at, already decoded
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ipv4FragmentHeader {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub identification: u16,
    pub protocol: u8,
    pub tos: u8,
    /// Header length in bytes, options included
    pub header_len: u16,
    /// Datagram length from the header
    pub total_len: u16,
    /// Fragment offset in 8-byte units
    pub fragment_offset: u16,
    pub more_fragments: bool,
}

impl Ipv4FragmentHeader {
    pub fn is_fragment(&self) -> bool {
        self.more_fragments || self.fragment_offset != 0
    }

    pub fn key(&self) -> FragmentKey {
        FragmentKey::v4(
            self.src,
            self.dst,
            self.identification,
            self.protocol,
            self.tos,
        )
    }

    pub fn payload_len(&self) -> Result<u32, MalformedFragment> {
        self.total_len
            .checked_sub(self.header_len)
            .map(u32::from)
            .ok_or(MalformedFragment::BadHeaderLength {
                header_len: self.header_len,
                total_len: self.total_len,
            })
    }

    /// Validate the header against `payload` and build the fragment entry
    ///
    /// `payload` starts right after the IP header. Bytes past the length the
    /// header declares (link layer padding) are cut off.
    pub fn prepare<B: PacketBuffer>(&self, mut payload: B) -> Result<FragmentEntry<B>, MalformedFragment> {
        let flen = self.payload_len()?;
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

        if self.is_fragment() {
            if flen == 0 {
                return Err(MalformedFragment::Empty);
            }
            if self.more_fragments && (flen & 0x7) != 0 {
                return Err(MalformedFragment::Misaligned(flen));
            }
        }

        let offset = u32::from(self.fragment_offset) << 3;
        let entry = FragmentEntry::new(offset, self.more_fragments, payload);
        if offset == 0 {
            return Ok(entry.with_first_info(FirstFragmentInfo {
                unfragmentable_len: self.header_len,
                next_header: self.protocol,
            }));
        }
        Ok(entry)
    }
}

impl<B: PacketBuffer> ReassemblyEngine<B> {
    /// Feed a decoded IPv4 packet
    ///
    /// Unfragmented packets come straight back as complete without touching
    /// the table.
    pub fn submit_ipv4(
        &self,
        header: &Ipv4FragmentHeader,
        payload: B,
    ) -> Result<ReassemblyOutcome<Reassembled<B>>, MalformedFragment> {
        if self.policy().family != ProtocolFamily::V4 {
            return Err(MalformedFragment::WrongFamily(self.policy().family));
        }
        let entry = header.prepare(payload)?;
        if !header.is_fragment() {
            let info = entry.first_info().unwrap_or_default();
            return Ok(ReassemblyOutcome::Complete(Reassembled::unfragmented(
                header.key(),
                info,
                entry.into_payload(),
            )));
        }
        Ok(self.submit_fragment(header.key(), entry))
    }

    /// Feed a decoded IPv4 packet, handing completed datagrams to the sink
    pub fn input_ipv4(
        &self,
        header: &Ipv4FragmentHeader,
        payload: B,
    ) -> Result<ReassemblyOutcome<()>, MalformedFragment> {
        Ok(self.deliver(self.submit_ipv4(header, payload)?))
    }
}
