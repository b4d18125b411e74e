//! DNS message header and question section.
//!
//! Only the first question is decoded. Answer, authority and additional
//! records are never parsed: allowed queries are forwarded as opaque bytes
//! and responses are relayed unmodified.

use hickory_proto::rr::RecordType;

use super::name::{DomainName, decode_name};
use crate::error::DecodeError;

/// Fixed DNS header size in bytes.
pub const DNS_HEADER_SIZE: usize = 12;

/// The fixed 12-byte DNS message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl DnsHeader {
    pub fn parse(message: &[u8]) -> Result<Self, DecodeError> {
        let Some(bytes) = message.get(..DNS_HEADER_SIZE) else {
            return Err(DecodeError::Malformed("shorter than DNS header"));
        };
        let field = |i: usize| u16::from_be_bytes([bytes[i], bytes[i + 1]]);

        Ok(Self {
            id: field(0),
            flags: field(2),
            question_count: field(4),
            answer_count: field(6),
            authority_count: field(8),
            additional_count: field(10),
        })
    }

    /// Whether the QR bit marks this message as a response.
    #[inline]
    pub const fn is_response(&self) -> bool {
        self.flags & 0x8000 != 0
    }
}

/// One entry of the question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: DomainName,
    pub query_type: u16,
    pub query_class: u16,
}

impl DnsQuestion {
    pub fn record_type(&self) -> RecordType {
        RecordType::from(self.query_type)
    }
}

/// Decode the header and the first question of a DNS message.
pub fn parse_question(message: &[u8]) -> Result<(DnsHeader, DnsQuestion), DecodeError> {
    let header = DnsHeader::parse(message)?;
    if header.question_count == 0 {
        return Err(DecodeError::Malformed("no question in DNS message"));
    }

    let (name, next) = decode_name(message, DNS_HEADER_SIZE)?;
    let Some(tail) = message.get(next..next + 4) else {
        return Err(DecodeError::Malformed("truncated question type and class"));
    };

    let question = DnsQuestion {
        name,
        query_type: u16::from_be_bytes([tail[0], tail[1]]),
        query_class: u16::from_be_bytes([tail[2], tail[3]]),
    };

    Ok((header, question))
}
