//! Benchmarks for blocklist lookups.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use phishguard::blocklist::Blocklist;
use phishguard::dns::{DomainEncoding, DomainName, PolicyEngine};

fn generate_blocklist(size: usize) -> Blocklist {
    (0..size)
        .map(|i| {
            if i % 2 == 0 {
                format!("phish{i}.com")
            } else {
                format!("login{i}.bank.net")
            }
        })
        .collect()
}

fn bench_is_blocked(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocklist_lookup");

    for size in &[10, 100, 1000, 10000] {
        let blocklist = generate_blocklist(*size);

        group.bench_with_input(BenchmarkId::new("exact_hit", size), &blocklist, |b, list| {
            b.iter(|| list.is_blocked(black_box("phish0.com")));
        });

        // Every suffix is probed before the parent entry matches.
        group.bench_with_input(
            BenchmarkId::new("subdomain_hit", size),
            &blocklist,
            |b, list| {
                b.iter(|| list.is_blocked(black_box("a.b.c.d.login1.bank.net")));
            },
        );

        group.bench_with_input(BenchmarkId::new("miss", size), &blocklist, |b, list| {
            b.iter(|| list.is_blocked(black_box("www.Example.ORG")));
        });
    }

    group.finish();
}

fn bench_policy(c: &mut Criterion) {
    let policy = PolicyEngine::new(Arc::new(generate_blocklist(10_000)))
        .with_classifier(Arc::new(|input: &DomainEncoding| -> f32 {
            if input.as_slice()[0] == f32::from(b'v') { 0.9 } else { 0.1 }
        }));
    let allowed: DomainName = "mail.example.org".parse().unwrap();
    let flagged: DomainName = "verify-account.example.org".parse().unwrap();

    let mut group = c.benchmark_group("policy_decide");
    group.bench_function("allowed", |b| {
        b.iter(|| policy.decide(black_box(&allowed)));
    });
    group.bench_function("classifier_block", |b| {
        b.iter(|| policy.decide(black_box(&flagged)));
    });
    group.finish();
}

criterion_group!(benches, bench_is_blocked, bench_policy);
criterion_main!(benches);
