//! The per-tunnel packet loop.
//!
//! Reads one packet at a time from the virtual interface and decides its
//! fate: non-DNS traffic is written back untouched, blocked queries are
//! dropped and reported, allowed queries are relayed upstream and the
//! response is written back.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::events::{BlockEvent, EventSink, TunnelEvent};
use crate::dns::{FilterDecision, PolicyEngine, UpstreamForwarder};
use crate::error::InterfaceError;
use crate::network::udp::DNS_PORT;
use crate::network::{
    Decoded, DnsQuery, PacketBuilder, ResponseFraming, VirtualInterface, decode_dns_question,
};

/// Size of the reused read buffer.
pub const READ_BUFFER_SIZE: usize = 32_767;

/// What happened to one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Not a readable DNS query; written back unchanged.
    PassedThrough,
    /// Query for a blocked domain; dropped and reported.
    Blocked,
    /// Query relayed upstream and the response written back.
    Forwarded,
    /// Allowed query whose response could not be obtained or framed.
    Dropped,
}

impl PacketOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PassedThrough => "passed_through",
            Self::Blocked => "blocked",
            Self::Forwarded => "forwarded",
            Self::Dropped => "dropped",
        }
    }
}

/// Why [`CaptureLoop::run`] returned.
#[derive(Debug)]
pub enum LoopExit {
    /// Cancellation was requested; any read or write failure seen while
    /// cancelled is part of the shutdown.
    Cancelled,
    /// The interface failed while the loop was still wanted.
    Fault(InterfaceError),
}

/// Per-session knobs of the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Real resolver allowed queries are relayed to.
    pub upstream: SocketAddr,
    /// Additional destination port treated as DNS besides 53.
    pub resolver_port: u16,
    pub framing: ResponseFraming,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            upstream: SocketAddr::from(([8, 8, 8, 8], DNS_PORT)),
            resolver_port: DNS_PORT,
            framing: ResponseFraming::Verbatim,
        }
    }
}

pub struct CaptureLoop<F> {
    interface: Arc<dyn VirtualInterface>,
    policy: PolicyEngine,
    forwarder: F,
    events: Arc<dyn EventSink>,
    settings: CaptureSettings,
    packet_builder: PacketBuilder,
}

impl<F: UpstreamForwarder> CaptureLoop<F> {
    pub fn new(
        interface: Arc<dyn VirtualInterface>,
        policy: PolicyEngine,
        forwarder: F,
        events: Arc<dyn EventSink>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            interface,
            policy,
            forwarder,
            events,
            settings,
            packet_builder: PacketBuilder::default(),
        }
    }

    /// Run until cancelled or until the interface fails.
    ///
    /// Blocks the calling thread. Packets are handled strictly one after
    /// the other.
    pub fn run(self, cancel: CancellationToken) -> LoopExit {
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        info!(upstream = %self.settings.upstream, "capture loop started");

        let exit = loop {
            if cancel.is_cancelled() {
                break LoopExit::Cancelled;
            }

            let len = match self.interface.read(&mut buffer) {
                Ok(0) if cancel.is_cancelled() => break LoopExit::Cancelled,
                Ok(0) => {
                    break LoopExit::Fault(InterfaceError::Read(io::ErrorKind::UnexpectedEof.into()));
                }
                Ok(len) => len,
                Err(_) if cancel.is_cancelled() => break LoopExit::Cancelled,
                Err(e) => break LoopExit::Fault(InterfaceError::Read(e)),
            };

            match self.process_packet(&buffer[..len]) {
                Ok(outcome) => {
                    counter!("phishguard_packets_total", "outcome" => outcome.as_str()).increment(1);
                }
                Err(_) if cancel.is_cancelled() => break LoopExit::Cancelled,
                Err(e) => break LoopExit::Fault(e),
            }
        };

        match &exit {
            LoopExit::Cancelled => info!("capture loop stopped"),
            LoopExit::Fault(e) => error!(error = %e, "capture loop failed"),
        }
        exit
    }

    /// Handle one captured packet.
    ///
    /// # Errors
    ///
    /// Only a failed write to the interface is an error; every other
    /// per-packet failure is absorbed into the returned outcome.
    pub fn process_packet(&self, packet: &[u8]) -> Result<PacketOutcome, InterfaceError> {
        match decode_dns_question(packet, self.settings.resolver_port) {
            Ok(Decoded::Query(query)) => self.handle_query(&query),
            Ok(Decoded::NotDns) => self.pass_through(packet),
            Err(e) => {
                debug!(error = %e, len = packet.len(), "undecodable DNS packet passed through");
                counter!("phishguard_decode_errors_total").increment(1);
                self.pass_through(packet)
            }
        }
    }

    #[instrument(
        skip_all,
        fields(domain = %query.question.name, qtype = %query.question.record_type())
    )]
    fn handle_query(&self, query: &DnsQuery<'_>) -> Result<PacketOutcome, InterfaceError> {
        let FilterDecision::Block { domain, reason } = self.policy.decide(&query.question.name)
        else {
            return self.forward(query);
        };

        info!(%reason, "query blocked");
        self.events
            .emit(TunnelEvent::Blocked(BlockEvent::now(domain, reason)));
        Ok(PacketOutcome::Blocked)
    }

    fn forward(&self, query: &DnsQuery<'_>) -> Result<PacketOutcome, InterfaceError> {
        let response = match self.forwarder.forward(query.payload, self.settings.upstream) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "query dropped");
                counter!("phishguard_forward_failures_total").increment(1);
                return Ok(PacketOutcome::Dropped);
            }
        };

        match self.settings.framing {
            ResponseFraming::Verbatim => self.write(&response)?,
            ResponseFraming::Ipv4 => {
                match self.packet_builder.build_ipv4_response(&response, query) {
                    Ok(packet) => self.write(&packet)?,
                    Err(e) => {
                        warn!(error = %e, "response dropped");
                        return Ok(PacketOutcome::Dropped);
                    }
                }
            }
        }

        debug!(response_len = response.len(), "response written");
        Ok(PacketOutcome::Forwarded)
    }

    fn pass_through(&self, packet: &[u8]) -> Result<PacketOutcome, InterfaceError> {
        self.write(packet)?;
        Ok(PacketOutcome::PassedThrough)
    }

    fn write(&self, packet: &[u8]) -> Result<(), InterfaceError> {
        self.interface.write(packet).map_err(InterfaceError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::Blocklist;
    use crate::dns::BlockReason;
    use crate::dns::forwarder::tests::StubForwarder;
    use crate::network::interface::tests::MockInterface;
    use crate::tunnel::events::ChannelSink;
    use pnet::packet::ip::IpNextHeaderProtocols;
    use pnet::packet::ipv4::MutableIpv4Packet;
    use pnet::packet::udp::MutableUdpPacket;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    fn dns_query(name: &str) -> Vec<u8> {
        let mut dns = vec![0x42, 0x42, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        for label in name.split('.') {
            dns.push(label.len() as u8);
            dns.extend_from_slice(label.as_bytes());
        }
        dns.extend_from_slice(&[0, 0x00, 0x01, 0x00, 0x01]);
        ip_udp(53, &dns)
    }

    fn ip_udp(dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let udp_len = 8 + payload.len();
        let total = 20 + udp_len;
        let mut data = vec![0u8; total];
        {
            let mut udp = MutableUdpPacket::new(&mut data[20..]).unwrap();
            udp.set_source(50000);
            udp.set_destination(dst_port);
            udp.set_length(udp_len as u16);
            udp.set_payload(payload);
        }
        let mut ip = MutableIpv4Packet::new(&mut data).unwrap();
        ip.set_version(4);
        ip.set_header_length(5);
        ip.set_total_length(total as u16);
        ip.set_ttl(64);
        ip.set_next_level_protocol(IpNextHeaderProtocols::Udp);
        ip.set_source([10, 8, 0, 2].into());
        ip.set_destination([10, 8, 0, 1].into());
        data
    }

    struct Fixture {
        interface: Arc<MockInterface>,
        forwarder: Arc<StubForwarder>,
        events: tokio::sync::mpsc::UnboundedReceiver<TunnelEvent>,
        capture: CaptureLoop<Arc<StubForwarder>>,
    }

    fn fixture(blocked: &[&str], forwarder: StubForwarder, packets: Vec<Vec<u8>>) -> Fixture {
        let interface = Arc::new(MockInterface::with_packets(packets));
        let forwarder = Arc::new(forwarder);
        let (sink, events) = ChannelSink::new();
        let capture = CaptureLoop::new(
            interface.clone(),
            PolicyEngine::new(Arc::new(Blocklist::new(blocked))),
            Arc::clone(&forwarder),
            Arc::new(sink),
            CaptureSettings::default(),
        );
        Fixture {
            interface,
            forwarder,
            events,
            capture,
        }
    }

    #[test]
    fn should_drop_and_report_blocked_query() {
        let mut f = fixture(&["example.com"], StubForwarder::replying(&[1]), vec![]);

        let outcome = f.capture.process_packet(&dns_query("ads.example.com")).unwrap();

        assert_eq!(outcome, PacketOutcome::Blocked);
        assert!(f.interface.written().is_empty());
        assert_eq!(f.forwarder.call_count(), 0);
        let Ok(TunnelEvent::Blocked(event)) = f.events.try_recv() else {
            panic!("expected a block event");
        };
        assert_eq!(event.domain, "ads.example.com");
        assert_eq!(event.reason, BlockReason::Blocklist);
        assert!(f.events.try_recv().is_err());
    }

    #[test]
    fn should_forward_payload_and_write_response_verbatim() {
        let response = [0x42, 0x42, 0x81, 0x80, 9, 9, 9];
        let mut f = fixture(&[], StubForwarder::replying(&response), vec![]);
        let packet = dns_query("google.com");

        let outcome = f.capture.process_packet(&packet).unwrap();

        assert_eq!(outcome, PacketOutcome::Forwarded);
        assert_eq!(f.interface.written(), vec![response.to_vec()]);
        let calls = f.forwarder.calls.lock();
        assert_eq!(calls[0].0, packet[28..].to_vec());
        assert_eq!(calls[0].1, CaptureSettings::default().upstream);
        drop(calls);
        assert!(f.events.try_recv().is_err());
    }

    #[test]
    fn should_drop_query_silently_when_upstream_fails() {
        let f = fixture(&[], StubForwarder::failing(), vec![]);

        let outcome = f.capture.process_packet(&dns_query("google.com")).unwrap();

        assert_eq!(outcome, PacketOutcome::Dropped);
        assert!(f.interface.written().is_empty());
    }

    #[test]
    fn should_pass_through_non_dns_and_malformed_packets() {
        let f = fixture(&["example.com"], StubForwarder::replying(&[1]), vec![]);
        let https = ip_udp(443, b"quic");
        let truncated_dns = ip_udp(53, &[0x42, 0x42, 0x01]);

        assert_eq!(f.capture.process_packet(&https).unwrap(), PacketOutcome::PassedThrough);
        assert_eq!(
            f.capture.process_packet(&truncated_dns).unwrap(),
            PacketOutcome::PassedThrough
        );
        assert_eq!(f.interface.written(), vec![https, truncated_dns]);
        assert_eq!(f.forwarder.call_count(), 0);
    }

    #[test]
    fn should_report_write_failure_as_interface_error() {
        let f = fixture(&[], StubForwarder::replying(&[1]), vec![]);
        f.interface.fail_writes.store(true, Ordering::SeqCst);

        let result = f.capture.process_packet(&ip_udp(443, b"x"));
        assert!(matches!(result, Err(InterfaceError::Write(_))));
    }

    #[test]
    fn should_frame_response_as_ipv4_when_configured() {
        let interface = Arc::new(MockInterface::default());
        let (sink, _events) = ChannelSink::new();
        let capture = CaptureLoop::new(
            interface.clone(),
            PolicyEngine::new(Arc::new(Blocklist::default())),
            StubForwarder::replying(&[0x42, 0x42, 0x81, 0x80]),
            Arc::new(sink),
            CaptureSettings {
                framing: ResponseFraming::Ipv4,
                ..CaptureSettings::default()
            },
        );

        capture.process_packet(&dns_query("google.com")).unwrap();

        let written = interface.written();
        assert_eq!(written[0].len(), 20 + 8 + 4);
        assert_eq!(&written[0][28..], &[0x42, 0x42, 0x81, 0x80]);
    }

    #[test]
    fn should_exit_cleanly_when_cancelled_during_read() {
        let f = fixture(&[], StubForwarder::replying(&[1]), vec![ip_udp(443, b"x")]);
        let interface = Arc::clone(&f.interface);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let worker = std::thread::spawn(move || f.capture.run(token));

        while interface.pending() > 0 {
            std::thread::sleep(Duration::from_millis(5));
        }
        cancel.cancel();
        interface.close();

        assert!(matches!(worker.join().unwrap(), LoopExit::Cancelled));
        assert_eq!(interface.written().len(), 1);
    }

    #[test]
    fn should_report_fault_when_read_fails_uncancelled() {
        let f = fixture(&[], StubForwarder::replying(&[1]), vec![]);
        f.interface.close();

        let exit = f.capture.run(CancellationToken::new());
        assert!(matches!(exit, LoopExit::Fault(InterfaceError::Read(_))));
    }

    /// An interface whose every read reports end of file.
    #[derive(Default)]
    struct EofInterface {
        reads: AtomicUsize,
    }

    impl VirtualInterface for EofInterface {
        fn read(&self, _buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }

        fn write(&self, _packet: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn close(&self) {}
    }

    fn eof_capture(interface: Arc<EofInterface>) -> CaptureLoop<StubForwarder> {
        let (sink, _events) = ChannelSink::new();
        CaptureLoop::new(
            interface,
            PolicyEngine::new(Arc::new(Blocklist::default())),
            StubForwarder::replying(&[1]),
            Arc::new(sink),
            CaptureSettings::default(),
        )
    }

    #[test]
    fn should_report_fault_on_end_of_file() {
        let interface = Arc::new(EofInterface::default());
        let capture = eof_capture(Arc::clone(&interface));
        let (done, exit) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = done.send(capture.run(CancellationToken::new()));
        });

        let exit = exit
            .recv_timeout(Duration::from_secs(5))
            .expect("capture loop kept reading after end of file");
        match exit {
            LoopExit::Fault(InterfaceError::Read(e)) => {
                assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected a read fault, got {other:?}"),
        }
        assert_eq!(interface.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_exit_cleanly_on_end_of_file_after_cancel() {
        let cancel = CancellationToken::new();
        let capture = eof_capture(Arc::new(EofInterface::default()));
        cancel.cancel();

        assert!(matches!(capture.run(cancel), LoopExit::Cancelled));
    }

    #[test]
    fn should_pass_through_dns_responses_sent_to_resolver_port() {
        let f = fixture(&["example.com"], StubForwarder::replying(&[1]), vec![]);
        let mut response = dns_query("ads.example.com");
        // QR bit set.
        response[28 + 2] = 0x81;
        response[28 + 3] = 0x80;

        let outcome = f.capture.process_packet(&response).unwrap();

        assert_eq!(outcome, PacketOutcome::PassedThrough);
        assert_eq!(f.forwarder.call_count(), 0);
        assert_eq!(f.interface.written(), vec![response]);
    }
}
