//! IPv4 header view.

use std::net::Ipv4Addr;

use pnet::packet::ip::IpNextHeaderProtocol;
use pnet::packet::ipv4::Ipv4Packet;

use crate::error::DecodeError;

/// Minimal IPv4 header size in bytes (IHL = 5).
pub const IPV4_MIN_HEADER_SIZE: usize = 20;

/// Decoded fields of an IPv4 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    /// Header length in 32-bit words, 5 to 15.
    pub ihl: u8,
    pub protocol: IpNextHeaderProtocol,
    /// Declared length of header plus payload.
    pub total_length: u16,
    pub fragment_offset: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    /// Read the header at the start of `packet`.
    ///
    /// Only the length invariants are checked here; a version other than 4
    /// is reported through [`version`](Self::version) so the caller can
    /// decide what to do with it.
    pub fn parse(packet: &[u8]) -> Result<Self, DecodeError> {
        let ipv4 =
            Ipv4Packet::new(packet).ok_or(DecodeError::Malformed("shorter than IPv4 header"))?;

        let header = Self {
            version: ipv4.get_version(),
            ihl: ipv4.get_header_length(),
            protocol: ipv4.get_next_level_protocol(),
            total_length: ipv4.get_total_length(),
            fragment_offset: ipv4.get_fragment_offset(),
            source: ipv4.get_source(),
            destination: ipv4.get_destination(),
        };

        if header.version != 4 {
            return Ok(header);
        }
        if header.ihl < 5 {
            return Err(DecodeError::Malformed("IPv4 IHL below 5"));
        }
        if header.header_len() > packet.len() {
            return Err(DecodeError::Malformed("IPv4 header exceeds packet"));
        }
        let total = usize::from(header.total_length);
        if total < header.header_len() || total > packet.len() {
            return Err(DecodeError::Malformed("IPv4 total length out of range"));
        }

        Ok(header)
    }

    /// Header length in bytes.
    #[inline]
    pub const fn header_len(&self) -> usize {
        self.ihl as usize * 4
    }

    /// The transport payload, excluding link padding past the declared total length.
    #[inline]
    pub fn payload<'a>(&self, packet: &'a [u8]) -> &'a [u8] {
        &packet[self.header_len()..usize::from(self.total_length)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::ip::IpNextHeaderProtocols;
    use pnet::packet::ipv4::MutableIpv4Packet;

    fn packet(ihl: u8, len: usize) -> Vec<u8> {
        let mut buffer = vec![0u8; len];
        let mut ipv4 = MutableIpv4Packet::new(&mut buffer).unwrap();
        ipv4.set_version(4);
        ipv4.set_header_length(ihl);
        ipv4.set_total_length(len as u16);
        ipv4.set_next_level_protocol(IpNextHeaderProtocols::Udp);
        ipv4.set_source(Ipv4Addr::new(10, 8, 0, 2));
        ipv4.set_destination(Ipv4Addr::new(10, 8, 0, 1));
        buffer
    }

    #[test]
    fn should_compute_header_length_for_every_ihl() {
        for ihl in 5u8..=15 {
            let header = Ipv4Header::parse(&packet(ihl, 60 + 8)).unwrap();
            assert_eq!(header.ihl, ihl);
            assert_eq!(header.header_len(), usize::from(ihl) * 4);
        }
    }

    #[test]
    fn should_reject_packet_shorter_than_declared_header() {
        for ihl in 6u8..=15 {
            let len = usize::from(ihl) * 4 - 1;
            let mut buffer = packet(5, len);
            buffer[0] = 0x40 | ihl;
            assert_eq!(
                Ipv4Header::parse(&buffer),
                Err(DecodeError::Malformed("IPv4 header exceeds packet"))
            );
        }
    }

    #[test]
    fn should_reject_packet_shorter_than_minimal_header() {
        assert!(Ipv4Header::parse(&[0x45; 19]).is_err());
        assert!(Ipv4Header::parse(&[]).is_err());
    }

    #[test]
    fn should_reject_ihl_below_five() {
        let mut buffer = packet(5, 28);
        buffer[0] = 0x44;
        assert!(Ipv4Header::parse(&buffer).is_err());
    }

    #[test]
    fn should_reject_total_length_beyond_packet() {
        let mut buffer = packet(5, 28);
        buffer[2..4].copy_from_slice(&100u16.to_be_bytes());
        assert!(Ipv4Header::parse(&buffer).is_err());
    }

    #[test]
    fn should_ignore_trailing_padding() {
        let mut buffer = packet(5, 28);
        buffer.extend_from_slice(&[0xff; 4]);
        let header = Ipv4Header::parse(&buffer).unwrap();
        assert_eq!(header.payload(&buffer).len(), 8);
    }

    #[test]
    fn should_report_other_versions_without_validating() {
        let mut buffer = vec![0u8; 40];
        buffer[0] = 0x60;
        let header = Ipv4Header::parse(&buffer).unwrap();
        assert_eq!(header.version, 6);
    }
}
