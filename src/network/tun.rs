//! Linux TUN backend built on `/dev/net/tun`.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use super::interface::{InterfaceProvider, InterfaceSettings, VirtualInterface};
use crate::error::InterfaceError;

const TUN_PATH: &str = "/dev/net/tun";
const TUNSETIFF: libc::c_ulong = 0x4004_54ca;
const IFF_TUN: libc::c_short = 0x0001;
const IFF_NO_PI: libc::c_short = 0x1000;

/// How long a read waits before re-checking whether the device was closed.
const POLL_INTERVAL_MS: libc::c_int = 100;

#[repr(C)]
struct TunRequest {
    name: [u8; libc::IFNAMSIZ],
    flags: libc::c_short,
    _pad: [u8; 22],
}

/// Creates TUN devices and configures them with the `ip` tool.
///
/// Requires `CAP_NET_ADMIN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxTunProvider;

impl InterfaceProvider for LinuxTunProvider {
    fn establish(
        &self,
        settings: &InterfaceSettings,
    ) -> Result<Arc<dyn VirtualInterface>, InterfaceError> {
        let device = TunDevice::open(&settings.name)?;
        configure(settings)?;
        info!(
            name = %settings.name,
            address = %settings.address,
            prefix_len = settings.prefix_len,
            mtu = settings.mtu,
            routes = settings.routes.len(),
            "TUN device established"
        );
        Ok(Arc::new(device))
    }
}

/// An open TUN device in non-blocking mode.
///
/// The descriptor stays open until the last handle is dropped, so closing
/// never races with a `poll` in flight; `close` only flips a flag the
/// reader checks between polls.
#[derive(Debug)]
pub struct TunDevice {
    file: File,
    name: String,
    closed: AtomicBool,
}

impl TunDevice {
    fn open(name: &str) -> Result<Self, InterfaceError> {
        if name.is_empty() || name.len() >= libc::IFNAMSIZ {
            return Err(InterfaceError::Establish(format!(
                "invalid interface name {name:?}"
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(TUN_PATH)
            .map_err(|e| InterfaceError::Establish(format!("failed to open {TUN_PATH}: {e}")))?;

        let mut request = TunRequest {
            name: [0; libc::IFNAMSIZ],
            flags: IFF_TUN | IFF_NO_PI,
            _pad: [0; 22],
        };
        request.name[..name.len()].copy_from_slice(name.as_bytes());

        let fd = file.as_raw_fd();
        // SAFETY: `fd` is a valid open descriptor and `request` outlives the call.
        if unsafe { libc::ioctl(fd, TUNSETIFF as _, &raw mut request) } < 0 {
            return Err(InterfaceError::Establish(format!(
                "TUNSETIFF failed: {}",
                io::Error::last_os_error()
            )));
        }

        // SAFETY: plain flag manipulation on a descriptor we own.
        let nonblocking = unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            flags >= 0 && libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) >= 0
        };
        if !nonblocking {
            return Err(InterfaceError::Establish(format!(
                "failed to set O_NONBLOCK: {}",
                io::Error::last_os_error()
            )));
        }

        Ok(Self {
            file,
            name: name.to_owned(),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("{} is closed", self.name),
            ));
        }
        Ok(())
    }

    /// Wait until the descriptor is readable. `Ok(false)` on timeout.
    fn wait_readable(&self) -> io::Result<bool> {
        let mut fds = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: `fds` is a single valid pollfd.
        let ready = unsafe { libc::poll(&mut fds, 1, POLL_INTERVAL_MS) };
        match ready {
            n if n < 0 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
            0 => Ok(false),
            _ => Ok(true),
        }
    }
}

impl VirtualInterface for TunDevice {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            self.ensure_open()?;
            if !self.wait_readable()? {
                continue;
            }
            match (&self.file).read(buf) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                other => return other,
            }
        }
    }

    fn write(&self, packet: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        let written = (&self.file).write(packet)?;
        if written != packet.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {written} of {} bytes", packet.len()),
            ));
        }
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(name = %self.name, "TUN device closed");
        }
    }
}

fn configure(settings: &InterfaceSettings) -> Result<(), InterfaceError> {
    let name = settings.name.as_str();
    let address = format!("{}/{}", settings.address, settings.prefix_len);
    let mtu = settings.mtu.to_string();

    run_ip(&["addr", "add", &address, "dev", name])?;
    run_ip(&["link", "set", "dev", name, "mtu", &mtu])?;
    run_ip(&["link", "set", "dev", name, "up"])?;
    for route in &settings.routes {
        run_ip(&["route", "replace", &route.to_string(), "dev", name])?;
    }

    if !settings.dns_servers.is_empty() {
        let mut args = vec!["dns".to_owned(), name.to_owned()];
        args.extend(settings.dns_servers.iter().map(ToString::to_string));
        match Command::new("resolvectl").args(&args).output() {
            Ok(output) if output.status.success() => {
                debug!(interface = name, servers = ?settings.dns_servers, "DNS servers assigned");
            }
            Ok(output) => warn!(
                interface = name,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "failed to assign DNS servers"
            ),
            Err(e) => warn!(interface = name, error = %e, "resolvectl unavailable, DNS servers not assigned"),
        }
    }

    Ok(())
}

fn run_ip(args: &[&str]) -> Result<(), InterfaceError> {
    let output = Command::new("ip")
        .args(args)
        .output()
        .map_err(|e| InterfaceError::Establish(format!("failed to run ip: {e}")))?;
    if !output.status.success() {
        return Err(InterfaceError::Establish(format!(
            "ip {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    debug!(command = %args.join(" "), "ip");
    Ok(())
}
