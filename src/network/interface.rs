//! Virtual interface abstraction.
//!
//! Provides a trait-based abstraction over the host's virtual interface to
//! enable:
//! - Testing the capture loop without a real TUN device
//! - Different host backends (Linux `/dev/net/tun`, mobile VPN services)

use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::InterfaceError;

/// An IPv4 route in CIDR notation, e.g. `0.0.0.0/0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteCidr {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl RouteCidr {
    pub const fn new(address: Ipv4Addr, prefix_len: u8) -> Self {
        Self {
            address,
            prefix_len,
        }
    }

    /// Whether `address` falls inside this route.
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        let mask = u32::MAX
            .checked_shl(32 - u32::from(self.prefix_len.min(32)))
            .unwrap_or(0);
        u32::from(address) & mask == u32::from(self.address) & mask
    }
}

impl fmt::Display for RouteCidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for RouteCidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, prefix) = s
            .split_once('/')
            .ok_or_else(|| format!("route {s:?} is missing a prefix length"))?;
        let address = address
            .parse()
            .map_err(|e| format!("invalid route address {address:?}: {e}"))?;
        let prefix_len: u8 = prefix
            .parse()
            .map_err(|e| format!("invalid route prefix {prefix:?}: {e}"))?;
        if prefix_len > 32 {
            return Err(format!("route prefix /{prefix_len} exceeds 32"));
        }
        Ok(Self::new(address, prefix_len))
    }
}

/// Everything the host needs to bring up the virtual interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSettings {
    pub name: String,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    pub routes: Vec<RouteCidr>,
    pub dns_servers: Vec<Ipv4Addr>,
    pub mtu: u16,
}

/// An established virtual interface.
///
/// `close` may be called from another thread while a `read` is blocked;
/// the pending and all later reads must then fail promptly.
pub trait VirtualInterface: Send + Sync {
    /// Block until one packet is available and copy it into `buf`.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Inject one packet.
    fn write(&self, packet: &[u8]) -> io::Result<()>;

    /// Release the interface. Idempotent.
    fn close(&self);
}

/// Host capability that creates virtual interfaces.
pub trait InterfaceProvider: Send + Sync + 'static {
    fn establish(
        &self,
        settings: &InterfaceSettings,
    ) -> Result<Arc<dyn VirtualInterface>, InterfaceError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    /// In-memory interface for testing.
    ///
    /// Reads pop queued packets; once the queue is empty a read waits until
    /// the interface is closed and then fails.
    #[derive(Default)]
    pub struct MockInterface {
        inbound: Mutex<VecDeque<Vec<u8>>>,
        pub written: Mutex<Vec<Vec<u8>>>,
        closed: AtomicBool,
        pub fail_writes: AtomicBool,
    }

    impl MockInterface {
        pub fn with_packets(packets: Vec<Vec<u8>>) -> Self {
            Self {
                inbound: Mutex::new(packets.into()),
                ..Self::default()
            }
        }

        pub fn written(&self) -> Vec<Vec<u8>> {
            self.written.lock().clone()
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        pub fn pending(&self) -> usize {
            self.inbound.lock().len()
        }
    }

    impl VirtualInterface for MockInterface {
        fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                if self.is_closed() {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "interface closed"));
                }
                if let Some(packet) = self.inbound.lock().pop_front() {
                    buf[..packet.len()].copy_from_slice(&packet);
                    return Ok(packet.len());
                }
                thread::sleep(Duration::from_millis(5));
            }
        }

        fn write(&self, packet: &[u8]) -> io::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::other("write refused"));
            }
            self.written.lock().push(packet.to_vec());
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn should_parse_routes() {
        let route: RouteCidr = "10.8.0.0/24".parse().unwrap();
        assert_eq!(route, RouteCidr::new(Ipv4Addr::new(10, 8, 0, 0), 24));
        assert_eq!(route.to_string(), "10.8.0.0/24");

        assert!("10.8.0.0".parse::<RouteCidr>().is_err());
        assert!("10.8.0.0/40".parse::<RouteCidr>().is_err());
        assert!("nope/8".parse::<RouteCidr>().is_err());
    }

    #[test]
    fn should_match_addresses_inside_route() {
        let default: RouteCidr = "0.0.0.0/0".parse().unwrap();
        assert!(default.contains(Ipv4Addr::new(8, 8, 8, 8)));

        let subnet: RouteCidr = "10.8.0.0/24".parse().unwrap();
        assert!(subnet.contains(Ipv4Addr::new(10, 8, 0, 77)));
        assert!(!subnet.contains(Ipv4Addr::new(10, 8, 1, 1)));

        let host: RouteCidr = "10.8.0.1/32".parse().unwrap();
        assert!(host.contains(Ipv4Addr::new(10, 8, 0, 1)));
        assert!(!host.contains(Ipv4Addr::new(10, 8, 0, 2)));
    }

    #[test]
    fn should_unblock_mock_reads_on_close() {
        let interface = Arc::new(MockInterface::default());
        let reader = Arc::clone(&interface);
        let handle = thread::spawn(move || reader.read(&mut [0u8; 64]));

        thread::sleep(Duration::from_millis(20));
        interface.close();

        assert!(handle.join().unwrap().is_err());
    }
}
