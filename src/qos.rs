// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS comparison/merge engine contract. The engine itself — full QoS
//! comparison semantics, policy compatibility matching — is out of scope;
//! this crate only needs the two named operations used by plist assembly
//! and SEDP merge (`xqos_delta`, `xqos_mergein_missing`) plus the handful
//! of liveliness/reliability/durability fields the discovery algorithms
//! themselves branch on.

use std::time::Duration;

/// Bitmask of QoS policy ids, wide enough for every policy the discovery
/// core names explicitly (§4.C, §4.E).
pub type QosMask = u64;

pub const QOS_USER_DATA: QosMask = 1 << 0;
pub const QOS_ENTITY_NAME: QosMask = 1 << 1;
pub const QOS_PROPERTY_LIST: QosMask = 1 << 2;
pub const QOS_LIVELINESS: QosMask = 1 << 3;
pub const QOS_RELIABILITY: QosMask = 1 << 4;
pub const QOS_DURABILITY: QosMask = 1 << 5;
pub const QOS_ALL: QosMask = u64::MAX;
pub const QOS_ALL_NON_LIVELINESS: QosMask = QOS_ALL & !QOS_LIVELINESS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliabilityKind {
    BestEffort,
    Reliable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityKind {
    Volatile,
    TransientLocal,
    Transient,
    Persistent,
}

#[derive(Debug, Clone)]
pub struct Liveliness {
    pub lease_duration: Option<Duration>,
}

/// The subset of QoS this crate reads or writes. A full QoS structure is
/// the embedding application's concern; this is only the intersection the
/// discovery algorithms branch on.
#[derive(Debug, Clone, Default)]
pub struct Xqos {
    pub present: QosMask,
    pub user_data: Option<Vec<u8>>,
    pub entity_name: Option<String>,
    pub property_list: Vec<(String, String)>,
    pub liveliness: Option<Liveliness>,
    pub reliability: Option<ReliabilityKind>,
    pub durability: Option<DurabilityKind>,
    pub autodispose_unregistered_instances: Option<bool>,
}

impl Xqos {
    pub fn has(&self, bit: QosMask) -> bool {
        self.present & bit != 0
    }
}

/// External collaborator contract for QoS delta/merge. A reference
/// implementation is provided because the algorithms that consume it
/// (`build_participant_plist`, `handle_sedp_alive_endpoint`) need *some*
/// working implementation to be testable end to end; a real embedding
/// application is expected to supply its own full QoS engine.
pub trait QosEngine: Send + Sync {
    /// Bits set in `b` that differ from `a`, restricted to `mask`.
    fn xqos_delta(&self, a: &Xqos, b: &Xqos, mask: QosMask) -> QosMask;
    /// Copies fields from `src` into `dst` wherever `dst` doesn't already
    /// have the corresponding bit present, restricted to `mask`.
    fn xqos_mergein_missing(&self, dst: &mut Xqos, src: &Xqos, mask: QosMask);
}

#[derive(Debug, Default)]
pub struct DefaultQosEngine;

impl QosEngine for DefaultQosEngine {
    fn xqos_delta(&self, a: &Xqos, b: &Xqos, mask: QosMask) -> QosMask {
        let mut out = 0;
        for bit in [
            QOS_USER_DATA,
            QOS_ENTITY_NAME,
            QOS_PROPERTY_LIST,
            QOS_LIVELINESS,
            QOS_RELIABILITY,
            QOS_DURABILITY,
        ] {
            if mask & bit == 0 {
                continue;
            }
            let differs = match bit {
                QOS_USER_DATA => a.user_data != b.user_data,
                QOS_ENTITY_NAME => a.entity_name != b.entity_name,
                QOS_PROPERTY_LIST => a.property_list != b.property_list,
                QOS_LIVELINESS => {
                    a.liveliness.as_ref().map(|l| l.lease_duration)
                        != b.liveliness.as_ref().map(|l| l.lease_duration)
                }
                QOS_RELIABILITY => a.reliability != b.reliability,
                QOS_DURABILITY => a.durability != b.durability,
                _ => false,
            };
            if differs {
                out |= bit;
            }
        }
        out
    }

    fn xqos_mergein_missing(&self, dst: &mut Xqos, src: &Xqos, mask: QosMask) {
        if mask & QOS_USER_DATA != 0 && !dst.has(QOS_USER_DATA) && src.has(QOS_USER_DATA) {
            dst.user_data = src.user_data.clone();
            dst.present |= QOS_USER_DATA;
        }
        if mask & QOS_ENTITY_NAME != 0 && !dst.has(QOS_ENTITY_NAME) && src.has(QOS_ENTITY_NAME) {
            dst.entity_name = src.entity_name.clone();
            dst.present |= QOS_ENTITY_NAME;
        }
        if mask & QOS_PROPERTY_LIST != 0
            && !dst.has(QOS_PROPERTY_LIST)
            && src.has(QOS_PROPERTY_LIST)
        {
            dst.property_list = src.property_list.clone();
            dst.present |= QOS_PROPERTY_LIST;
        }
        if mask & QOS_LIVELINESS != 0 && !dst.has(QOS_LIVELINESS) && src.has(QOS_LIVELINESS) {
            dst.liveliness = src.liveliness.clone();
            dst.present |= QOS_LIVELINESS;
        }
        if mask & QOS_RELIABILITY != 0 && !dst.has(QOS_RELIABILITY) && src.has(QOS_RELIABILITY) {
            dst.reliability = src.reliability;
            dst.present |= QOS_RELIABILITY;
        }
        if mask & QOS_DURABILITY != 0 && !dst.has(QOS_DURABILITY) && src.has(QOS_DURABILITY) {
            dst.durability = src.durability;
            dst.present |= QOS_DURABILITY;
        }
        if dst.autodispose_unregistered_instances.is_none() {
            dst.autodispose_unregistered_instances = src.autodispose_unregistered_instances;
        }
    }
}
