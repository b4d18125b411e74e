//! Domain list format parser.

use std::io::BufRead;

use super::{BlocklistParser, ParseError};

/// Parser for plain domain lists.
///
/// # Format
///
/// - One domain per line; it blocks itself and every subdomain
/// - `#` starts a comment, at the start of a line or after whitespace
/// - A leading `*.` is accepted and dropped since subdomains already match
/// - Entries are lowercased
///
/// ```text
/// # phishing
/// paypal-secure-login.com
/// *.evil.example   # same as evil.example
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainListParser;

impl BlocklistParser for DomainListParser {
    fn parse(&self, reader: &mut dyn BufRead) -> Result<Vec<String>, ParseError> {
        let mut domains = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let content = strip_comment(&line).trim();
            if content.is_empty() {
                continue;
            }
            if content.contains(char::is_whitespace) {
                return Err(ParseError::InvalidLine {
                    line: index + 1,
                    reason: format!("expected a single domain, got {content:?}"),
                });
            }

            let domain = content.strip_prefix("*.").unwrap_or(content);
            domains.push(domain.to_ascii_lowercase());
        }

        Ok(domains)
    }
}

fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    line.find(" #")
        .or_else(|| line.find("\t#"))
        .map_or(line, |at| &line[..at])
}
