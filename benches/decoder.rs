//! Benchmarks for the packet decoder.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::net::Ipv4Addr;

use phishguard::dns::decode_name;
use phishguard::network::{Decoded, PacketBuilder, decode_dns_question};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::MutableIpv4Packet;
use pnet::packet::udp::MutableUdpPacket;

fn query_payload(name: &str) -> Vec<u8> {
    let mut payload = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
    for label in name.split('.') {
        payload.push(label.len() as u8);
        payload.extend_from_slice(label.as_bytes());
    }
    payload.extend_from_slice(&[0, 0, 1, 0, 1]);
    payload
}

fn udp_packet(destination_port: u16, payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let mut data = vec![0u8; 20 + udp_len];
    {
        let mut udp = MutableUdpPacket::new(&mut data[20..]).unwrap();
        udp.set_source(40_000);
        udp.set_destination(destination_port);
        udp.set_length(udp_len as u16);
        udp.set_payload(payload);
    }
    let mut ip = MutableIpv4Packet::new(&mut data).unwrap();
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length((20 + udp_len) as u16);
    ip.set_ttl(64);
    ip.set_next_level_protocol(IpNextHeaderProtocols::Udp);
    ip.set_source(Ipv4Addr::new(10, 0, 0, 2));
    ip.set_destination(Ipv4Addr::new(8, 8, 8, 8));
    data
}

fn bench_decode_packet(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_packet");

    let short = udp_packet(53, &query_payload("example.com"));
    group.bench_function("short_query", |b| {
        b.iter(|| decode_dns_question(black_box(&short), 53));
    });

    let long = udp_packet(
        53,
        &query_payload("a.very.deeply.nested.subdomain.of.some.phishing.example.org"),
    );
    group.bench_function("long_query", |b| {
        b.iter(|| decode_dns_question(black_box(&long), 53));
    });

    let https = udp_packet(443, b"not dns at all");
    group.bench_function("not_dns", |b| {
        b.iter(|| decode_dns_question(black_box(&https), 53));
    });

    group.finish();
}

fn bench_decode_name(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_name");

    let plain = query_payload("login.secure.bank.example");
    group.bench_function("uncompressed", |b| {
        b.iter(|| decode_name(black_box(&plain), 12));
    });

    // Second name is "www" followed by a pointer back to the question name.
    let mut compressed = query_payload("bank.example");
    let second = compressed.len();
    compressed.extend_from_slice(&[3, b'w', b'w', b'w', 0xC0, 12]);
    group.bench_function("compressed", |b| {
        b.iter(|| decode_name(black_box(&compressed), second));
    });

    group.finish();
}

fn bench_response_framing(c: &mut Criterion) {
    let packet = udp_packet(53, &query_payload("example.com"));
    let Ok(Decoded::Query(query)) = decode_dns_question(&packet, 53) else {
        panic!("benchmark packet must decode");
    };
    let builder = PacketBuilder::default();
    let response = query_payload("example.com");

    c.bench_function("build_ipv4_response", |b| {
        b.iter(|| builder.build_ipv4_response(black_box(&response), black_box(&query)));
    });
}

criterion_group!(
    benches,
    bench_decode_packet,
    bench_decode_name,
    bench_response_framing
);
criterion_main!(benches);
