//! Hosts file format parser.
//!
//! Reads `/etc/hosts`-style blocklists where blocked names are pointed at a
//! sinkhole address.

use std::io::BufRead;
use std::net::IpAddr;

use super::{BlocklistParser, ParseError};

/// Parser for hosts file format.
///
/// Only lines mapping to `0.0.0.0` or `127.0.0.1` contribute names. System
/// names such as `localhost` and tokens that are themselves IP addresses
/// are skipped, as is anything after `#`.
///
/// ```text
/// 127.0.0.1 localhost
/// 0.0.0.0 login-paypal.example account-verify.example
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HostsFileParser;

const IGNORED_NAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "ip6-localnet",
    "ip6-mcastprefix",
    "ip6-allnodes",
    "ip6-allrouters",
    "ip6-allhosts",
];

const SINKHOLE_ADDRESSES: &[&str] = &["0.0.0.0", "127.0.0.1"];

impl BlocklistParser for HostsFileParser {
    fn parse(&self, reader: &mut dyn BufRead) -> Result<Vec<String>, ParseError> {
        let mut domains = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let content = line.split('#').next().unwrap_or_default();
            let mut tokens = content.split_whitespace();

            let Some(address) = tokens.next() else {
                continue;
            };
            if !SINKHOLE_ADDRESSES.contains(&address) {
                continue;
            }

            domains.extend(
                tokens
                    .map(str::to_ascii_lowercase)
                    .filter(|name| !IGNORED_NAMES.contains(&name.as_str()))
                    .filter(|name| !is_address_like(name)),
            );
        }

        Ok(domains)
    }
}

/// Whether `token` is an address rather than a host name, including the
/// over-long `0.0.0.0.0.0.0.0` placeholder some lists carry.
fn is_address_like(token: &str) -> bool {
    if token.parse::<IpAddr>().is_ok() || token.contains(':') {
        return true;
    }
    token.contains('.') && token.split('.').all(|part| part.parse::<u8>().is_ok())
}
