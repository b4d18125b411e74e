//! Upstream forwarding of allowed DNS queries.
//!
//! Provides abstraction over the upstream round trip to enable:
//! - Testing the capture loop with stub forwarders
//! - Different socket protection strategies per host platform

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::debug;

use crate::error::ForwardError;
use crate::network::SocketProtector;

/// Largest DNS response accepted from upstream.
pub const MAX_RESPONSE_SIZE: usize = 32_767;

/// Default bound on one upstream round trip.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Relays a raw DNS query to a resolver and returns the raw response.
///
/// Implementations run on the capture worker thread and may block.
pub trait UpstreamForwarder: Send + Sync + 'static {
    fn forward(&self, query: &[u8], resolver: SocketAddr) -> Result<Vec<u8>, ForwardError>;
}

/// Forwarder that opens one protected UDP socket per query.
///
/// The socket lives for exactly one round trip and is closed on every
/// path, whether the exchange succeeds, times out or fails.
#[derive(Debug, Clone)]
pub struct UdpForwarder {
    protector: Arc<dyn SocketProtector>,
    timeout: Duration,
}

impl UdpForwarder {
    pub fn new(protector: Arc<dyn SocketProtector>, timeout: Duration) -> Self {
        Self { protector, timeout }
    }

    fn open(&self, resolver: SocketAddr) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::for_address(resolver), Type::DGRAM, Some(Protocol::UDP))?;
        self.protector.protect(&socket)?;

        let local: SocketAddr = match resolver {
            SocketAddr::V4(_) => (std::net::Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        socket.bind(&SockAddr::from(local))?;
        socket.set_read_timeout(Some(self.timeout))?;
        socket.set_write_timeout(Some(self.timeout))?;
        socket.connect(&SockAddr::from(resolver))?;

        Ok(socket.into())
    }

    fn exchange(&self, query: &[u8], resolver: SocketAddr) -> io::Result<Vec<u8>> {
        let socket = self.open(resolver)?;
        socket.send(query)?;

        let mut response = vec![0u8; MAX_RESPONSE_SIZE];
        let len = socket.recv(&mut response)?;
        response.truncate(len);
        Ok(response)
    }
}

impl Default for UdpForwarder {
    fn default() -> Self {
        Self::new(Arc::new(crate::network::Unprotected), DEFAULT_FORWARD_TIMEOUT)
    }
}

impl UpstreamForwarder for UdpForwarder {
    fn forward(&self, query: &[u8], resolver: SocketAddr) -> Result<Vec<u8>, ForwardError> {
        let response = self
            .exchange(query, resolver)
            .map_err(|source| ForwardError::Unreachable { resolver, source })?;
        debug!(
            resolver = %resolver,
            query_len = query.len(),
            response_len = response.len(),
            "upstream round trip complete"
        );
        Ok(response)
    }
}

impl<F: UpstreamForwarder> UpstreamForwarder for Arc<F> {
    fn forward(&self, query: &[u8], resolver: SocketAddr) -> Result<Vec<u8>, ForwardError> {
        (**self).forward(query, resolver)
    }
}
