//! Network-related modules for packet decoding, construction and the
//! virtual interface.

pub mod decode;
pub mod interface;
pub mod ipv4;
mod packet;
pub mod protect;
#[cfg(target_os = "linux")]
pub mod tun;
pub mod udp;

pub use decode::{Decoded, DnsQuery, decode_dns_question};
pub use interface::{InterfaceProvider, InterfaceSettings, RouteCidr, VirtualInterface};
pub use packet::{MAX_PACKET_SIZE, PacketBuilder, ResponseFraming};
pub use protect::{SocketProtector, Unprotected};
#[cfg(target_os = "linux")]
pub use tun::LinuxTunProvider;
