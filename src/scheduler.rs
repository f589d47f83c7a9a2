// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Response scheduler (component G): staggers SPDP responses with a
//! deterministic pseudo-random delay so a multicast announcement doesn't
//! trigger every listener to reply at once.

use std::time::Duration;

use crate::guid::Guid;
use crate::lease::MonotonicNanos;

/// Ten fixed 64-bit odd constants used to mix two GUIDs and a timestamp
/// into a 32-bit pseudo-random value. Arbitrary but fixed — changing them
/// changes which delay a given `(x, y, t)` produces, not whether the
/// scheme works.
const MIX: [u64; 10] = [
    0x9E37_79B9_7F4A_7C15,
    0xBF58_476D_1CE4_E5B9,
    0x94D0_49BB_1331_11EB,
    0xC2B2_AE3D_27D4_EB4F,
    0x1656_67B1_9E37_79F9,
    0xD6E8_FEB8_6659_FD93,
    0xA24B_AED4_963E_E407,
    0x9FB2_1C65_1E98_DF25,
    0xFF51_AFD7_ED55_8CCD,
    0xC4CE_B9FE_1A85_EC53,
];

fn word(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(buf) as u64
}

/// Deterministic pseudo-random hash of two GUIDs and a monotonic
/// timestamp, via five multiplicative mixing steps over ten fixed
/// constants. Returns the high 32 bits of the final 64-bit accumulator.
pub fn pseudo_random_delay(x_guid: Guid, y_guid: Guid, tnow: MonotonicNanos) -> u32 {
    let a = word(&x_guid.prefix.0[0..4]);
    let b = word(&x_guid.prefix.0[4..8]);
    let c = word(&x_guid.prefix.0[8..12]);
    let d = u32::from_be_bytes(x_guid.entity_id.0) as u64;
    let e = word(&y_guid.prefix.0[0..4]);
    let f = word(&y_guid.prefix.0[4..8]);
    let g = word(&y_guid.prefix.0[8..12]);
    let h = u32::from_be_bytes(y_guid.entity_id.0) as u64;
    let i = tnow >> 32;
    let j = tnow & 0xFFFF_FFFF;

    let pairs: [(u64, u64); 5] = [(a, b), (c, d), (e, f), (g, h), (i, j)];
    let mut m: u64 = 0;
    for (k, (x, y)) in pairs.iter().enumerate() {
        let cs0 = MIX[(2 * k) % MIX.len()];
        let cs1 = MIX[(2 * k + 1) % MIX.len()];
        m = m.wrapping_add(x.wrapping_add(cs0).wrapping_mul(y.wrapping_add(cs1)));
    }
    (m >> 32) as u32
}

/// `delay_norm = hash >> 2`, then `delay = delay_norm * delay_max_ms / 1000`
/// (§4.G). Operates in nanoseconds end to end so the caller never needs an
/// intermediate millisecond rounding step.
pub fn response_delay(x_guid: Guid, y_guid: Guid, tnow: MonotonicNanos, delay_max: Duration) -> Duration {
    let hash = pseudo_random_delay(x_guid, y_guid, tnow);
    let delay_norm = u64::from(hash >> 2);
    // delay_norm ranges over [0, 2^30); normalize against its range before
    // scaling into delay_max, matching the spec's "uniform in
    // [0, spdp_response_delay_max]" contract.
    let scaled = (delay_norm as u128 * delay_max.as_nanos()) / (1u128 << 30);
    Duration::from_nanos(scaled.min(delay_max.as_nanos()) as u64)
}

/// External collaborator: the timed-event scheduler (§1, out of scope).
/// `reschedule_earlier` applies when `unicast_response_to_spdp_messages`
/// is off (update the existing periodic SPDP event if the new delay is
/// sooner); `queue_directed` applies when it's on (a one-shot response
/// aimed at the discovering peer).
pub trait ResponseSink: Send + Sync {
    fn reschedule_earlier(&self, participant: Guid, at: MonotonicNanos);
    fn queue_directed(&self, participant: Guid, destination: Guid, at: MonotonicNanos);
}

/// §4.G: for each local participant, either reschedule its periodic SPDP
/// event earlier, or queue a one-shot directed response, depending on
/// `unicast_response_to_spdp_messages`.
pub fn schedule_spdp_response(
    sink: &dyn ResponseSink,
    local_participant: Guid,
    discovering_peer: Guid,
    tnow: MonotonicNanos,
    delay_max: Duration,
    unicast_response: bool,
) {
    let delay = response_delay(local_participant, discovering_peer, tnow, delay_max);
    let at = tnow.saturating_add(delay.as_nanos() as u64);
    if unicast_response {
        sink.queue_directed(local_participant, discovering_peer, at);
    } else {
        sink.reschedule_earlier(local_participant, at);
    }
}
