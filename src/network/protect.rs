//! Keeping upstream sockets out of the tunnel.
//!
//! Once the virtual interface carries the default route, a socket talking
//! to the real resolver would be routed straight back into the tunnel. A
//! [`SocketProtector`] marks each upstream socket before it sends anything
//! so that the host routes it around the interface.

use std::fmt;
use std::io;

use socket2::Socket;

use crate::config::ProtectConfig;

/// Excludes a socket from the virtual interface's routing.
pub trait SocketProtector: Send + Sync + fmt::Debug {
    fn protect(&self, socket: &Socket) -> io::Result<()>;
}

/// Leaves sockets untouched. Suitable when the tunnel routes do not cover
/// the upstream resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unprotected;

impl SocketProtector for Unprotected {
    fn protect(&self, _socket: &Socket) -> io::Result<()> {
        Ok(())
    }
}

/// Sets `SO_MARK` so a policy rule (`ip rule add fwmark <mark> table main`)
/// can route the socket around the tunnel.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy)]
pub struct FwMark(pub u32);

#[cfg(target_os = "linux")]
impl SocketProtector for FwMark {
    fn protect(&self, socket: &Socket) -> io::Result<()> {
        socket.set_mark(self.0)
    }
}

/// Pins the socket to a physical device with `SO_BINDTODEVICE`.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone)]
pub struct BindDevice(pub String);

#[cfg(target_os = "linux")]
impl SocketProtector for BindDevice {
    fn protect(&self, socket: &Socket) -> io::Result<()> {
        socket.bind_device(Some(self.0.as_bytes()))
    }
}

/// Applies several protectors in order.
#[derive(Debug, Default)]
pub struct ProtectChain(Vec<Box<dyn SocketProtector>>);

impl SocketProtector for ProtectChain {
    fn protect(&self, socket: &Socket) -> io::Result<()> {
        self.0.iter().try_for_each(|protector| protector.protect(socket))
    }
}

/// Build the protector described by the configuration.
#[cfg(target_os = "linux")]
pub fn from_config(config: &ProtectConfig) -> Box<dyn SocketProtector> {
    let mut chain: Vec<Box<dyn SocketProtector>> = Vec::new();
    if let Some(mark) = config.fwmark {
        chain.push(Box::new(FwMark(mark)));
    }
    if let Some(device) = &config.bind_device {
        chain.push(Box::new(BindDevice(device.clone())));
    }

    match chain.len() {
        0 => Box::new(Unprotected),
        1 => chain.remove(0),
        _ => Box::new(ProtectChain(chain)),
    }
}

/// Build the protector described by the configuration.
#[cfg(not(target_os = "linux"))]
pub fn from_config(config: &ProtectConfig) -> Box<dyn SocketProtector> {
    if config.fwmark.is_some() || config.bind_device.is_some() {
        tracing::warn!("socket protection is only supported on Linux; upstream sockets are unprotected");
    }
    Box::new(Unprotected)
}
