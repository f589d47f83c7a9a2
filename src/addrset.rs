// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Address-set builder (component B): turns a peer's advertised locator
//! lists, a source address, and optionally inherited interface enablement
//! into a transmit-ready [`AddressSet`].

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{AllowMulticast, DiscoveryConfig};
use crate::locator::{Interface, InterfaceSet, Locator, LocatorKind, Nearness};

/// A locator paired with the transmit connection (interface) chosen to
/// reach it. `conn` always equals the `index` of some interface in the
/// domain that produced this address set (invariant 3, §8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XLocator {
    pub conn: u8,
    pub locator: Locator,
}

/// Unordered, reference-counted collection of [`XLocator`]. No duplicate
/// `(kind, address, port, conn)` tuples.
#[derive(Debug, Clone, Default)]
pub struct AddressSet {
    inner: Arc<HashSet<XLocator>>,
}

impl AddressSet {
    pub fn empty() -> Self {
        AddressSet {
            inner: Arc::new(HashSet::new()),
        }
    }

    pub fn from_set(set: HashSet<XLocator>) -> Self {
        AddressSet {
            inner: Arc::new(set),
        }
    }

    pub fn any_uc(&self) -> bool {
        self.inner.iter().any(|x| !x.locator.is_multicast())
    }

    pub fn empty_uc(&self) -> bool {
        !self.any_uc()
    }

    pub fn empty_mc(&self) -> bool {
        !self.inner.iter().any(|x| x.locator.is_multicast())
    }

    pub fn forall(&self, mut f: impl FnMut(&XLocator) -> bool) -> bool {
        self.inner.iter().all(|x| f(x))
    }

    pub fn iter(&self) -> impl Iterator<Item = &XLocator> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Union of two sets, keeping only multicast or only unicast entries
    /// depending on `multicast`.
    pub fn filtered_union(&self, other: &AddressSet, multicast: bool) -> AddressSet {
        let mut out: HashSet<XLocator> = self
            .inner
            .iter()
            .chain(other.inner.iter())
            .filter(|x| x.locator.is_multicast() == multicast)
            .copied()
            .collect();
        out.shrink_to_fit();
        AddressSet::from_set(out)
    }

    /// Union of two sets, kinds unfiltered. Used to backfill just the
    /// missing portion (e.g. unicast) of an otherwise-usable set rather
    /// than discarding it wholesale.
    pub fn merge(&self, other: &AddressSet) -> AddressSet {
        let out: HashSet<XLocator> = self.inner.iter().chain(other.inner.iter()).copied().collect();
        AddressSet::from_set(out)
    }

    /// Copy of this set restricted to unicast, or multicast, entries.
    pub fn filtered_copy(&self, multicast: bool) -> AddressSet {
        let out: HashSet<XLocator> = self
            .inner
            .iter()
            .filter(|x| x.locator.is_multicast() == multicast)
            .copied()
            .collect();
        AddressSet::from_set(out)
    }
}

/// Builder accumulating `XLocator`s before the set is frozen into an
/// [`AddressSet`]. Mutation is exclusive to the builder; the resulting
/// `AddressSet` is treated as immutable thereafter (rebuilt, not patched,
/// on every subsequent SPDP/SEDP update).
#[derive(Debug, Default)]
struct Builder {
    set: HashSet<XLocator>,
}

impl Builder {
    fn push(&mut self, conn: u8, locator: Locator) {
        self.set.insert(XLocator { conn, locator });
    }

    fn finish(self) -> AddressSet {
        AddressSet::from_set(self.set)
    }
}

/// Whether a multicast locator may be admitted given `allow_multicast` and
/// the chosen interface's capability (invariant 4, §8).
fn allowmulticast_aware_add_to_addrset(
    allow: AllowMulticast,
    iface: &Interface,
    locator: &Locator,
    builder: &mut Builder,
) {
    if !iface.mc_capable {
        return;
    }
    let permitted = if locator.is_ssm_multicast() {
        allow.contains(AllowMulticast::SSM)
    } else {
        allow.contains(AllowMulticast::ASM)
    };
    if permitted {
        builder.push(iface.index, *locator);
    }
}

/// `allow_loopback`: every local interface is loopback, OR every
/// advertised unicast locator is loopback, OR any non-loopback advertised
/// unicast locator classifies as `SELF`.
fn compute_allow_loopback(uc: &[Locator], interfaces: &[Interface]) -> bool {
    if !interfaces.is_empty() && interfaces.iter().all(|i| i.loopback) {
        return true;
    }
    if !uc.is_empty() && uc.iter().all(|l| l.is_loopback()) {
        return true;
    }
    uc.iter().any(|l| {
        !l.is_loopback() && matches!(crate::locator::is_nearby_address(l, interfaces), Nearness::SelfAddr(_))
    })
}

/// Legacy NAT-mask rewrite: UDPv4 only, and only valid when the domain has
/// exactly one interface (the original asserts this; we degrade to "no
/// rewrite" rather than panic — see `DESIGN.md`).
fn legacy_nat_rewrite(locator: &Locator, interfaces: &[Interface]) -> Option<Locator> {
    if interfaces.len() != 1 {
        debug_assert!(
            interfaces.len() <= 1,
            "legacy external-mask rewrite is only specified for single-interface domains"
        );
        return None;
    }
    let iface = &interfaces[0];
    if locator.kind != LocatorKind::Udpv4 || iface.kind != LocatorKind::Udpv4 {
        return None;
    }
    let mask = iface.extmask?;
    let ext_net = u32::from_be_bytes([
        iface.extloc.address[12],
        iface.extloc.address[13],
        iface.extloc.address[14],
        iface.extloc.address[15],
    ]) & mask;
    let loc_host = u32::from_be_bytes([
        locator.address[12],
        locator.address[13],
        locator.address[14],
        locator.address[15],
    ]);
    if loc_host & mask != ext_net {
        return None;
    }
    let own_net = u32::from_be_bytes([
        iface.loc.address[12],
        iface.loc.address[13],
        iface.loc.address[14],
        iface.loc.address[15],
    ]) & mask;
    let rewritten_host = own_net | (loc_host & !mask);
    let mut out = *locator;
    out.address[12..16].copy_from_slice(&rewritten_host.to_be_bytes());
    Some(out)
}

fn first_routable_interface(interfaces: &[Interface]) -> Option<&Interface> {
    interfaces.iter().find(|i| !i.link_local && !i.loopback)
}

/// Core step-3/step-4 pass: classify each unicast locator in `list` and add
/// reachable ones to `builder`, setting `direct` when a SELF/LOCAL match is
/// made. Returns whether anything was added.
fn add_unicast_list(
    list: &[Locator],
    interfaces: &[Interface],
    config: &DiscoveryConfig,
    allow_loopback: bool,
    builder: &mut Builder,
    enabled: &mut InterfaceSet,
    direct: &mut bool,
) -> bool {
    let mut added = false;
    for raw in list {
        if raw.is_loopback() && !allow_loopback {
            continue;
        }

        let mut candidate = *raw;
        if let Some(iface) = interfaces.iter().find(|i| i.matches_external(raw)) {
            candidate = iface.loc;
        } else if let Some(rewritten) = legacy_nat_rewrite(raw, interfaces) {
            candidate = rewritten;
        }

        match crate::locator::is_nearby_address(&candidate, interfaces) {
            Nearness::SelfAddr(idx) | Nearness::Local(idx) => {
                builder.push(idx, candidate);
                enabled.set(idx);
                *direct = true;
                added = true;
            }
            Nearness::Distant => {
                if !config.dont_route {
                    if let Some(iface) = first_routable_interface(interfaces) {
                        builder.push(iface.index, candidate);
                        added = true;
                    }
                }
            }
            Nearness::Unreachable => {}
        }
    }
    added
}

/// `addrset_from_locatorlists`: builds a fresh [`AddressSet`] and an
/// [`InterfaceSet`] of interfaces enabled for subsequent multicast
/// admission, from advertised unicast/multicast locator lists, an optional
/// source locator, and optionally an inherited [`InterfaceSet`].
pub fn addrset_from_locatorlists(
    uc: &[Locator],
    mc: &[Locator],
    srcloc: Option<Locator>,
    inherited: Option<InterfaceSet>,
    interfaces: &[Interface],
    config: &DiscoveryConfig,
) -> (AddressSet, InterfaceSet) {
    let mut builder = Builder::default();
    let mut enabled = InterfaceSet::empty();
    let mut direct = false;

    let allow_loopback = compute_allow_loopback(uc, interfaces);
    let mut added = add_unicast_list(
        uc,
        interfaces,
        config,
        allow_loopback,
        &mut builder,
        &mut enabled,
        &mut direct,
    );

    if !added {
        if let Some(src) = srcloc.filter(|l| !l.is_unspec()) {
            added = add_unicast_list(
                std::slice::from_ref(&src),
                interfaces,
                config,
                allow_loopback,
                &mut builder,
                &mut enabled,
                &mut direct,
            );
        }
    }

    if !added {
        if let Some(inherited) = inherited {
            enabled.union(inherited);
        } else if !direct && config.multicast_ttl > 1 {
            for iface in interfaces.iter().filter(|i| !i.loopback && !i.link_local) {
                enabled.set(iface.index);
            }
        }
    }

    for m in mc {
        for iface in interfaces
            .iter()
            .filter(|i| enabled.contains(i.index) && i.mc_capable)
        {
            allowmulticast_aware_add_to_addrset(config.allow_multicast, iface, m, &mut builder);
        }
    }

    (builder.finish(), enabled)
}
