//! Error types for the phishguard tunnel.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Main error type for phishguard operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("virtual interface error: {0}")]
    Interface(#[from] InterfaceError),

    #[error("upstream forward error: {0}")]
    Forward(#[from] ForwardError),

    #[error("DNS decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("response framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("forward_timeout_ms must be greater than 0")]
    ZeroForwardTimeout,

    #[error("tunnel.mtu must be at least 576, got {0}")]
    MtuTooSmall(u16),

    #[error("tunnel.prefix_len must be at most 32, got {0}")]
    InvalidPrefixLen(u8),

    #[error("tunnel.name must be 1 to 15 bytes, got {0:?}")]
    InvalidInterfaceName(String),

    #[error("tunnel.resolver_port cannot be 0")]
    ZeroResolverPort,

    #[error("blocklist entry cannot be empty")]
    EmptyBlocklistEntry,

    #[error("blocklist source has empty file path")]
    EmptyBlocklistSourcePath,

    #[error("protect.bind_device cannot be empty")]
    EmptyBindDevice,

    #[error(
        "upstream_resolver {0} is routed through the tunnel; set protect.fwmark or protect.bind_device, or narrow tunnel.routes"
    )]
    UnprotectedUpstream(SocketAddr),
}

/// Wire-format decoding failure.
///
/// The capture loop treats every variant as "not a recognizable DNS question"
/// and passes the packet through.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
}

/// Failure relaying a query to the upstream resolver. Never retried.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream resolver {resolver} unreachable: {source}")]
    Unreachable {
        resolver: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Failure wrapping an upstream response into an IPv4 packet.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("response of {0} bytes does not fit in one IPv4 datagram")]
    TooLarge(usize),

    #[error("packet construction failed: {0}")]
    Construction(&'static str),
}

/// Virtual interface failures. Fatal to the current tunnel session.
#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error("failed to establish virtual interface: {0}")]
    Establish(String),

    #[error("failed to read from virtual interface: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write to virtual interface: {0}")]
    Write(#[source] io::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
