//! Configuration loading and validation.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result, ValidationError};
use crate::network::{InterfaceSettings, ResponseFraming, RouteCidr};
use crate::tunnel::{CaptureSettings, TunnelSettings};

/// Main configuration for the phishguard tunnel.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Real DNS resolver that allowed queries are relayed to.
    #[serde(
        default = "default_upstream_resolver",
        deserialize_with = "deserialize_socket_addr"
    )]
    pub upstream_resolver: SocketAddr,

    /// Upper bound on one upstream round trip, in milliseconds.
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,

    /// Inline blocked domains. A domain also blocks all of its subdomains.
    #[serde(default)]
    pub blocklist: Vec<String>,

    /// Blocklist files loaded once at startup.
    #[serde(default)]
    pub blocklist_sources: Vec<BlocklistSource>,

    /// Virtual interface settings.
    #[serde(default)]
    pub tunnel: TunnelConfig,

    /// How upstream sockets are kept out of the tunnel.
    #[serde(default)]
    pub protect: ProtectConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// A blocklist file and its format.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlocklistSource {
    pub path: PathBuf,

    #[serde(default)]
    pub format: BlocklistFormat,
}

/// Supported blocklist file formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlocklistFormat {
    /// One domain per line, `#` comments.
    #[default]
    Domains,
    /// `/etc/hosts` style, `0.0.0.0 domain` lines.
    Hosts,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TunnelConfig {
    #[serde(default = "default_interface_name")]
    pub name: String,

    /// Address assigned to the virtual interface.
    #[serde(default = "default_address")]
    pub address: Ipv4Addr,

    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,

    /// Destinations routed through the interface, in CIDR notation.
    /// Defaults to the advertised DNS server only.
    #[serde(default = "default_routes", deserialize_with = "deserialize_routes")]
    pub routes: Vec<RouteCidr>,

    /// DNS servers advertised to the host. Queries to these are intercepted.
    #[serde(default = "default_dns_servers")]
    pub dns_servers: Vec<Ipv4Addr>,

    #[serde(default = "default_mtu")]
    pub mtu: u16,

    /// UDP port treated as DNS in addition to 53.
    #[serde(default = "default_resolver_port")]
    pub resolver_port: u16,

    #[serde(default)]
    pub response_framing: ResponseFraming,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            name: default_interface_name(),
            address: default_address(),
            prefix_len: default_prefix_len(),
            routes: default_routes(),
            dns_servers: default_dns_servers(),
            mtu: default_mtu(),
            resolver_port: default_resolver_port(),
            response_framing: ResponseFraming::default(),
        }
    }
}

impl TunnelConfig {
    /// Whether traffic to `address` would enter the tunnel, either through
    /// a configured route or the interface's own subnet.
    pub fn routes_to(&self, address: Ipv4Addr) -> bool {
        RouteCidr::new(self.address, self.prefix_len).contains(address)
            || self.routes.iter().any(|route| route.contains(address))
    }

    /// Settings handed to the interface provider on connect.
    pub fn interface_settings(&self) -> InterfaceSettings {
        InterfaceSettings {
            name: self.name.clone(),
            address: self.address,
            prefix_len: self.prefix_len,
            routes: self.routes.clone(),
            dns_servers: self.dns_servers.clone(),
            mtu: self.mtu,
        }
    }
}

/// Upstream socket protection. With neither field set, sockets are left
/// unprotected and the routes must already exclude the upstream resolver.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtectConfig {
    /// Firewall mark applied with `SO_MARK`.
    pub fwmark: Option<u32>,

    /// Device the socket is bound to with `SO_BINDTODEVICE`.
    pub bind_device: Option<String>,
}

impl ProtectConfig {
    pub const fn is_enabled(&self) -> bool {
        self.fwmark.is_some() || self.bind_device.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(
        default = "default_metrics_listen",
        deserialize_with = "deserialize_socket_addr"
    )]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

fn default_upstream_resolver() -> SocketAddr {
    SocketAddr::from(([8, 8, 8, 8], 53))
}

const fn default_forward_timeout_ms() -> u64 {
    5_000
}

fn default_interface_name() -> String {
    "phish0".to_string()
}

const fn default_address() -> Ipv4Addr {
    Ipv4Addr::new(10, 8, 0, 2)
}

const fn default_prefix_len() -> u8 {
    24
}

fn default_routes() -> Vec<RouteCidr> {
    default_dns_servers()
        .into_iter()
        .map(|server| RouteCidr::new(server, 32))
        .collect()
}

fn default_dns_servers() -> Vec<Ipv4Addr> {
    vec![Ipv4Addr::new(10, 8, 0, 1)]
}

const fn default_mtu() -> u16 {
    1500
}

const fn default_resolver_port() -> u16 {
    53
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9_000))
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> std::result::Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn deserialize_routes<'de, D>(deserializer: D) -> std::result::Result<Vec<RouteCidr>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    raw.iter()
        .map(|s| s.parse().map_err(serde::de::Error::custom))
        .collect()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub const fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    /// Settings for one tunnel session.
    pub fn tunnel_settings(&self) -> TunnelSettings {
        TunnelSettings {
            interface: self.tunnel.interface_settings(),
            capture: CaptureSettings {
                upstream: self.upstream_resolver,
                resolver_port: self.tunnel.resolver_port,
                framing: self.tunnel.response_framing,
            },
        }
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.forward_timeout_ms == 0 {
            return Err(ValidationError::ZeroForwardTimeout);
        }

        let tunnel = &self.tunnel;
        if tunnel.mtu < 576 {
            return Err(ValidationError::MtuTooSmall(tunnel.mtu));
        }
        if tunnel.prefix_len > 32 {
            return Err(ValidationError::InvalidPrefixLen(tunnel.prefix_len));
        }
        // IFNAMSIZ minus the terminating NUL
        if tunnel.name.is_empty() || tunnel.name.len() > 15 {
            return Err(ValidationError::InvalidInterfaceName(tunnel.name.clone()));
        }
        if tunnel.resolver_port == 0 {
            return Err(ValidationError::ZeroResolverPort);
        }

        if self.blocklist.iter().any(|entry| entry.trim().is_empty()) {
            return Err(ValidationError::EmptyBlocklistEntry);
        }
        if self
            .blocklist_sources
            .iter()
            .any(|source| source.path.as_os_str().is_empty())
        {
            return Err(ValidationError::EmptyBlocklistSourcePath);
        }

        if self
            .protect
            .bind_device
            .as_deref()
            .is_some_and(|device| device.trim().is_empty())
        {
            return Err(ValidationError::EmptyBindDevice);
        }

        // An unprotected upstream socket inside the tunnel would recapture
        // every forwarded query.
        if let SocketAddr::V4(upstream) = self.upstream_resolver {
            if !self.protect.is_enabled() && tunnel.routes_to(*upstream.ip()) {
                return Err(ValidationError::UnprotectedUpstream(self.upstream_resolver));
            }
        }

        Ok(())
    }
}
