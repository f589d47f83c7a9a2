// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery Hot-Path Benchmark
//!
//! Measures the two per-sample computations that run on every inbound SPDP
//! message and every address-set rebuild:
//! - `pseudo_random_delay` / `response_delay`, the staggering hash behind
//!   SPDP response scheduling
//! - `addrset_from_locatorlists`, the address-set builder invoked whenever
//!   a proxy participant's or proxy endpoint's locators change
//!
//! Also checks the distributional claim behind invariant 7: the delay hash
//! should be uniform enough that its mean over many samples sits close to
//! the middle of its output range.

#![allow(clippy::cast_precision_loss)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hdds_pdp::addrset::addrset_from_locatorlists;
use hdds_pdp::config::DiscoveryConfig;
use hdds_pdp::guid::{Guid, GuidPrefix};
use hdds_pdp::locator::{Interface, InterfaceSet, Locator, LocatorKind};
use hdds_pdp::scheduler::{pseudo_random_delay, response_delay};
use std::time::Duration;

fn udp4(a: u8, b: u8, c: u8, d: u8, port: u32) -> Locator {
    let mut address = [0u8; 16];
    address[12] = a;
    address[13] = b;
    address[14] = c;
    address[15] = d;
    Locator {
        kind: LocatorKind::Udpv4,
        port,
        address,
    }
}

fn local_interfaces() -> Vec<Interface> {
    vec![Interface {
        loc: udp4(192, 168, 1, 10, 0),
        extloc: udp4(192, 168, 1, 10, 0),
        extmask: None,
        kind: LocatorKind::Udpv4,
        link_local: false,
        loopback: false,
        mc_capable: true,
        enable_spdp: true,
        index: 0,
    }]
}

fn bench_pseudo_random_delay(c: &mut Criterion) {
    let x = Guid::participant(GuidPrefix([0x11; 12]));
    let y = Guid::participant(GuidPrefix([0x22; 12]));
    c.bench_function("pseudo_random_delay", |b| {
        b.iter(|| black_box(pseudo_random_delay(black_box(x), black_box(y), black_box(123_456_789))));
    });
}

fn bench_response_delay(c: &mut Criterion) {
    let x = Guid::participant(GuidPrefix([0x33; 12]));
    let y = Guid::participant(GuidPrefix([0x44; 12]));
    let max = Duration::from_millis(400);
    c.bench_function("response_delay", |b| {
        b.iter(|| black_box(response_delay(black_box(x), black_box(y), black_box(987_654_321), max)));
    });
}

fn bench_addrset_from_locatorlists(c: &mut Criterion) {
    let interfaces = local_interfaces();
    let config = DiscoveryConfig::default();
    let uc = vec![udp4(192, 168, 1, 20, 7410), udp4(192, 168, 1, 21, 7410)];
    let mc = vec![udp4(239, 255, 0, 1, 7400)];
    c.bench_function("addrset_from_locatorlists", |b| {
        b.iter(|| {
            black_box(addrset_from_locatorlists(
                black_box(&uc),
                black_box(&mc),
                black_box(None),
                black_box(None::<InterfaceSet>),
                black_box(&interfaces),
                black_box(&config),
            ))
        });
    });
}

/// Invariant 7: `pseudo_random_delay`'s output should average close to
/// the midpoint of `u32`'s range across many distinct inputs. Ten thousand
/// samples keep this a cheap sanity check rather than a statistical test
/// suite; it runs inside the bench harness instead of `cargo test` because
/// its assertion is a distributional property, not a per-call contract.
fn bench_pseudo_random_delay_distribution(c: &mut Criterion) {
    const SAMPLES: u64 = 10_000;
    let expected_mean = f64::from(u32::MAX) / 2.0;

    c.bench_function("pseudo_random_delay_distribution_10k", |b| {
        b.iter(|| {
            let mut sum: u128 = 0;
            for i in 0..SAMPLES {
                let x = Guid::participant(GuidPrefix([(i % 251) as u8; 12]));
                let y = Guid::participant(GuidPrefix([((i * 7 + 3) % 251) as u8; 12]));
                sum += u128::from(pseudo_random_delay(x, y, i.wrapping_mul(0x9E37_79B9)));
            }
            let mean = sum as f64 / SAMPLES as f64;
            let tolerance = expected_mean * 0.05;
            assert!(
                (mean - expected_mean).abs() < tolerance,
                "mean {mean} strayed past 5% of {expected_mean}"
            );
            black_box(mean);
        });
    });
}

criterion_group!(
    benches,
    bench_pseudo_random_delay,
    bench_response_delay,
    bench_addrset_from_locatorlists,
    bench_pseudo_random_delay_distribution,
);
criterion_main!(benches);
