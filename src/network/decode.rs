//! DNS question extraction from raw IPv4 packets read off the interface.

use pnet::packet::ip::IpNextHeaderProtocols;

use super::ipv4::Ipv4Header;
use super::udp::UdpHeader;
use crate::dns::message::{DNS_HEADER_SIZE, DnsHeader, DnsQuestion, parse_question};
use crate::error::DecodeError;

/// A DNS query found in a captured packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery<'a> {
    pub ip: Ipv4Header,
    pub udp: UdpHeader,
    pub header: DnsHeader,
    pub question: DnsQuestion,
    /// The complete DNS message, exactly as received.
    pub payload: &'a [u8],
}

/// Outcome of decoding one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// Not an IPv4/UDP datagram addressed to a DNS port.
    NotDns,
    Query(DnsQuery<'a>),
}

/// Decode the first DNS question of `packet`.
///
/// Datagrams to port 53 or to `resolver_port` are treated as DNS.
/// Everything that is clearly some other traffic, including DNS responses
/// travelling towards the resolver port, yields [`Decoded::NotDns`]; traffic that should have been DNS but cannot be
/// read yields [`DecodeError::Malformed`].
pub fn decode_dns_question(packet: &[u8], resolver_port: u16) -> Result<Decoded<'_>, DecodeError> {
    let ip = Ipv4Header::parse(packet)?;
    if ip.version != 4
        || ip.protocol != IpNextHeaderProtocols::Udp
        || ip.fragment_offset != 0
    {
        return Ok(Decoded::NotDns);
    }

    let segment = ip.payload(packet);
    let udp = UdpHeader::parse(segment)?;
    if !udp.is_dns(resolver_port) {
        return Ok(Decoded::NotDns);
    }

    let payload = udp.payload(segment);
    if payload.len() < DNS_HEADER_SIZE {
        return Err(DecodeError::Malformed("UDP payload shorter than DNS header"));
    }
    if DnsHeader::parse(payload)?.is_response() {
        return Ok(Decoded::NotDns);
    }

    let (header, question) = parse_question(payload)?;

    Ok(Decoded::Query(DnsQuery {
        ip,
        udp,
        header,
        question,
        payload,
    }))
}
