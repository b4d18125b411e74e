//! Packet construction for DNS responses written back to the interface.

// Lengths are checked against `MAX_PACKET_SIZE` before any cast.
#![allow(clippy::cast_possible_truncation)]

use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{self, Ipv4Packet, MutableIpv4Packet};
use pnet::packet::udp::{self, MutableUdpPacket, UdpPacket};
use serde::Deserialize;

use super::decode::DnsQuery;
use super::ipv4::IPV4_MIN_HEADER_SIZE;
use super::udp::UDP_HEADER_SIZE;
use crate::error::FrameError;

/// Largest IPv4 datagram.
pub const MAX_PACKET_SIZE: usize = 65_535;

const DEFAULT_TTL: u8 = 64;

/// How an upstream response is written back to the interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFraming {
    /// Write the upstream bytes unmodified.
    #[default]
    Verbatim,
    /// Wrap the upstream bytes in an IPv4/UDP packet addressed back to the
    /// querying client.
    Ipv4,
}

/// Builder for IPv4/UDP response packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketBuilder {
    ttl: u8,
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl PacketBuilder {
    pub const fn new(ttl: u8) -> Self {
        Self { ttl }
    }

    /// Wrap `response` in a packet answering `query`.
    ///
    /// Addresses and ports are swapped relative to the query and both the
    /// IPv4 header checksum and the UDP checksum are filled in.
    pub fn build_ipv4_response(
        &self,
        response: &[u8],
        query: &DnsQuery<'_>,
    ) -> Result<Vec<u8>, FrameError> {
        let udp_len = UDP_HEADER_SIZE + response.len();
        let total_len = IPV4_MIN_HEADER_SIZE + udp_len;
        if total_len > MAX_PACKET_SIZE {
            return Err(FrameError::TooLarge(response.len()));
        }

        let source = query.ip.destination;
        let destination = query.ip.source;

        let mut buffer = vec![0u8; total_len];
        let packet_data = buffer.as_mut_slice();

        {
            let mut udp = MutableUdpPacket::new(&mut packet_data[IPV4_MIN_HEADER_SIZE..])
                .ok_or(FrameError::Construction("UDP packet creation failed"))?;
            udp.set_source(query.udp.destination_port);
            udp.set_destination(query.udp.source_port);
            udp.set_length(udp_len as u16);
            udp.set_payload(response);
        }

        let checksum = {
            let udp = UdpPacket::new(&packet_data[IPV4_MIN_HEADER_SIZE..])
                .ok_or(FrameError::Construction("UDP checksum failed"))?;
            udp::ipv4_checksum(&udp, &source, &destination)
        };
        MutableUdpPacket::new(&mut packet_data[IPV4_MIN_HEADER_SIZE..])
            .ok_or(FrameError::Construction("UDP checksum failed"))?
            .set_checksum(checksum);

        {
            let mut ip = MutableIpv4Packet::new(packet_data)
                .ok_or(FrameError::Construction("IPv4 packet creation failed"))?;
            ip.set_version(4);
            ip.set_header_length(5);
            ip.set_total_length(total_len as u16);
            ip.set_ttl(self.ttl);
            ip.set_next_level_protocol(IpNextHeaderProtocols::Udp);
            ip.set_source(source);
            ip.set_destination(destination);
            ip.set_checksum(ipv4::checksum(&ip.to_immutable()));
        }

        debug_assert!(Ipv4Packet::new(&buffer).is_some());
        Ok(buffer)
    }
}
