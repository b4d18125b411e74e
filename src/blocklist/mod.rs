//! Blocklist storage and loading.
//!
//! The [`Blocklist`] itself is an immutable set built once at startup. The
//! parsers and [`loader`] turn blocklist files into entries for it.
//!
//! # Supported Formats
//!
//! - **Domain List**: one domain per line
//! - **Hosts File**: standard `/etc/hosts` format used by public phishing and ad lists
//!
//! # Example
//!
//! ```
//! use phishguard::blocklist::{Blocklist, BlocklistParser, DomainListParser};
//! use std::io::BufReader;
//!
//! let content = "# phishing\nexample.com";
//! let domains = DomainListParser
//!     .parse(&mut BufReader::new(content.as_bytes()))
//!     .unwrap();
//! let blocklist = Blocklist::new(domains);
//! assert!(blocklist.is_blocked("login.example.com"));
//! ```

mod domains;
mod hosts;
pub mod loader;
mod set;

use std::io::BufRead;

pub use domains::DomainListParser;
pub use hosts::HostsFileParser;
pub use loader::{FileLoader, LoadError};
pub use set::Blocklist;

use crate::config::BlocklistFormat;

/// Error type for blocklist parsing operations.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Line number is 1-indexed.
    #[error("invalid line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },
}

/// Extracts blocklist entries from one file format.
pub trait BlocklistParser: Send + Sync {
    /// Parse blocklist content and return raw entries.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if reading fails or the content is invalid
    /// for the format.
    fn parse(&self, reader: &mut dyn BufRead) -> Result<Vec<String>, ParseError>;
}

/// Returns a boxed parser for the given blocklist format.
#[must_use]
pub fn parser_for_format(format: BlocklistFormat) -> Box<dyn BlocklistParser> {
    match format {
        BlocklistFormat::Domains => Box::new(DomainListParser),
        BlocklistFormat::Hosts => Box::new(HostsFileParser),
    }
}
