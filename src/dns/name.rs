//! Domain names and wire-format name decoding (RFC 1035 section 4.1.4).

use std::fmt;
use std::str::FromStr;

use crate::error::DecodeError;

/// Maximum length of a single label.
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum wire length of a name, length octets and root terminator included.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum number of compression pointers followed while decoding one name.
pub const MAX_POINTER_JUMPS: usize = 128;

const POINTER_MASK: u8 = 0xC0;

/// A domain name as a dot-joined sequence of labels, without the trailing root dot.
///
/// Case is preserved as decoded; use [`to_lowercase`](Self::to_lowercase)
/// before matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainName(String);

impl DomainName {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Length in wire format: one length octet per label, the label bytes,
    /// and the root terminator.
    pub fn wire_len(&self) -> usize {
        self.0.len() + 2
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for DomainName {
    type Err = DecodeError;

    /// Build a name from its presentation form. A single trailing dot is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_suffix('.').unwrap_or(s);
        if s.is_empty() {
            return Err(DecodeError::Malformed("empty domain name"));
        }
        if s
            .split('.')
            .any(|label| label.is_empty() || label.len() > MAX_LABEL_LEN)
        {
            return Err(DecodeError::Malformed("invalid label length"));
        }
        let name = Self(s.to_string());
        if name.wire_len() > MAX_NAME_LEN {
            return Err(DecodeError::Malformed("domain name too long"));
        }
        Ok(name)
    }
}

/// Decode the name starting at `offset` within `message`.
///
/// `message` is the whole DNS message: compression pointers are absolute
/// offsets from its first byte. Returns the name and the offset of the first
/// byte after it at the original position.
pub fn decode_name(message: &[u8], offset: usize) -> Result<(DomainName, usize), DecodeError> {
    let mut labels: Vec<&[u8]> = Vec::new();
    let mut wire_len = 1;
    let next = read_labels(message, offset, 0, &mut labels, &mut wire_len)?;

    if labels.is_empty() {
        return Err(DecodeError::Malformed("empty domain name"));
    }

    let mut name = String::with_capacity(wire_len);
    for (i, label) in labels.iter().enumerate() {
        if i > 0 {
            name.push('.');
        }
        name.push_str(&String::from_utf8_lossy(label));
    }

    Ok((DomainName(name), next))
}

/// Append the labels found at `offset` and return the offset just past the
/// name at this level. A pointer ends the name at its level, so the
/// returned offset never depends on where the pointer led.
fn read_labels<'a>(
    message: &'a [u8],
    mut offset: usize,
    jumps: usize,
    labels: &mut Vec<&'a [u8]>,
    wire_len: &mut usize,
) -> Result<usize, DecodeError> {
    loop {
        let &len = message
            .get(offset)
            .ok_or(DecodeError::Malformed("name runs past end of message"))?;

        match len & POINTER_MASK {
            0x00 if len == 0 => return Ok(offset + 1),
            0x00 => {
                let len = usize::from(len);
                let label = message
                    .get(offset + 1..offset + 1 + len)
                    .ok_or(DecodeError::Malformed("truncated label"))?;
                *wire_len += len + 1;
                if *wire_len > MAX_NAME_LEN {
                    return Err(DecodeError::Malformed("domain name too long"));
                }
                labels.push(label);
                offset += 1 + len;
            }
            POINTER_MASK => {
                let &low = message
                    .get(offset + 1)
                    .ok_or(DecodeError::Malformed("truncated compression pointer"))?;
                let target = usize::from(u16::from_be_bytes([len & !POINTER_MASK, low]));
                if target >= offset {
                    return Err(DecodeError::Malformed("compression pointer does not point backwards"));
                }
                if jumps >= MAX_POINTER_JUMPS {
                    return Err(DecodeError::Malformed("too many compression pointers"));
                }
                read_labels(message, target, jumps + 1, labels, wire_len)?;
                return Ok(offset + 2);
            }
            _ => return Err(DecodeError::Malformed("reserved label type")),
        }
    }
}
