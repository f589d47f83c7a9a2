// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Liveliness lease (§3, §5): `{duration, expiry, owner}`. Renewal is
//! lock-free — an atomic expiry timestamp plus the monotonic-time source
//! the caller supplies, mirroring the "atomic pointer plus atomic expiry
//! timestamp" renewal path described for `minl_auto` in the concurrency
//! model.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::guid::Guid;

/// Monotonic nanosecond timestamp. The discovery core never reads the
/// wall clock itself; callers supply `now` from whatever monotonic source
/// they already run (the timed-event scheduler, out of scope here).
pub type MonotonicNanos = u64;

const INFINITE: u64 = u64::MAX;

#[derive(Debug)]
pub struct Lease {
    owner: Guid,
    duration_nanos: AtomicU64,
    expiry_nanos: AtomicU64,
}

impl Lease {
    pub fn new(owner: Guid, duration: Duration, now: MonotonicNanos) -> Self {
        let duration_nanos = duration.as_nanos().min(u128::from(INFINITE - 1)) as u64;
        Lease {
            owner,
            duration_nanos: AtomicU64::new(duration_nanos),
            expiry_nanos: AtomicU64::new(now.saturating_add(duration_nanos)),
        }
    }

    /// A lease that never expires, used for dependency-slaved proxies
    /// (invariant 1, §8: `privileged_pp_guid != 0` implies
    /// `duration == INFINITY`).
    pub fn infinite(owner: Guid) -> Self {
        Lease {
            owner,
            duration_nanos: AtomicU64::new(INFINITE),
            expiry_nanos: AtomicU64::new(INFINITE),
        }
    }

    pub fn owner(&self) -> Guid {
        self.owner
    }

    pub fn is_infinite(&self) -> bool {
        self.duration_nanos.load(Ordering::Relaxed) == INFINITE
    }

    /// Converts this lease to never-expiring in place, for a proxy
    /// reattached to a privileged participant after construction
    /// (invariant 1, §8). A no-op if already infinite.
    pub fn make_infinite(&self) {
        self.duration_nanos.store(INFINITE, Ordering::Relaxed);
        self.expiry_nanos.store(INFINITE, Ordering::Release);
    }

    /// Renewal only ever advances the expiry; a stale (reordered) renewal
    /// at an earlier `now` must not regress it.
    pub fn renew(&self, now: MonotonicNanos) {
        if self.is_infinite() {
            return;
        }
        let duration = self.duration_nanos.load(Ordering::Relaxed);
        let candidate = now.saturating_add(duration);
        self.expiry_nanos.fetch_max(candidate, Ordering::AcqRel);
    }

    pub fn is_expired(&self, now: MonotonicNanos) -> bool {
        if self.is_infinite() {
            return false;
        }
        now > self.expiry_nanos.load(Ordering::Acquire)
    }

    pub fn expiry(&self) -> MonotonicNanos {
        self.expiry_nanos.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_lease_never_expires() {
        let lease = Lease::infinite(Guid::zero());
        assert!(lease.is_infinite());
        assert!(!lease.is_expired(u64::MAX - 1));
    }

    #[test]
    fn renewal_only_advances_expiry() {
        let lease = Lease::new(Guid::zero(), Duration::from_millis(100), 0);
        let initial = lease.expiry();
        lease.renew(0);
        assert_eq!(lease.expiry(), initial, "renewal at the same time must not regress");
        lease.renew(50_000_000);
        assert!(lease.expiry() > initial);
    }

    #[test]
    fn expiry_check_respects_duration() {
        let lease = Lease::new(Guid::zero(), Duration::from_millis(100), 0);
        assert!(!lease.is_expired(50_000_000));
        assert!(lease.is_expired(200_000_000));
    }

    #[test]
    fn make_infinite_converts_a_finite_lease_in_place() {
        let lease = Lease::new(Guid::zero(), Duration::from_millis(100), 0);
        assert!(lease.is_expired(200_000_000));
        lease.make_infinite();
        assert!(lease.is_infinite());
        assert!(!lease.is_expired(u64::MAX - 1));
    }
}
