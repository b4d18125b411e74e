//! UDP header view.

use pnet::packet::udp::UdpPacket;

use crate::error::DecodeError;

/// UDP header size in bytes.
pub const UDP_HEADER_SIZE: usize = 8;

/// Well-known DNS port.
pub const DNS_PORT: u16 = 53;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    /// Header plus payload length as declared on the wire.
    pub length: u16,
}

impl UdpHeader {
    /// Read the header at the start of `segment` (the IPv4 payload).
    pub fn parse(segment: &[u8]) -> Result<Self, DecodeError> {
        let udp = UdpPacket::new(segment).ok_or(DecodeError::Malformed("truncated UDP header"))?;

        let header = Self {
            source_port: udp.get_source(),
            destination_port: udp.get_destination(),
            length: udp.get_length(),
        };

        let length = usize::from(header.length);
        if !(UDP_HEADER_SIZE..=segment.len()).contains(&length) {
            return Err(DecodeError::Malformed("UDP length out of range"));
        }

        Ok(header)
    }

    /// Whether this datagram is addressed to a DNS resolver.
    #[inline]
    pub const fn is_dns(&self, resolver_port: u16) -> bool {
        self.destination_port == DNS_PORT || self.destination_port == resolver_port
    }

    #[inline]
    pub fn payload<'a>(&self, segment: &'a [u8]) -> &'a [u8] {
        &segment[UDP_HEADER_SIZE..usize::from(self.length)]
    }
}
