// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Proxy entities (§3): local representations of remote participants,
//! writers, readers, and topics.
//!
//! Child→parent links are bare GUIDs resolved through the entity index on
//! demand (Design Notes, "cyclic references"), never owning references —
//! a `ProxyWriter` names its participant's GUID; looking it up is the
//! caller's job via [`crate::entity_index::EntityIndex`].

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::addrset::AddressSet;
use crate::guid::{Guid, VendorId};
use crate::lease::Lease;
use crate::plist::Plist;
use crate::qos::Xqos;

/// Fields guarded by the participant's `e.lock` (§5): `plist`,
/// `implicitly_created`, `seq`, `privileged_pp_guid`, and the proxy topic
/// table.
#[derive(Debug, Default)]
struct ProxyParticipantState {
    plist: Plist,
    implicitly_created: bool,
    seq: u64,
    privileged_pp_guid: Option<Guid>,
    proxy_topics: HashMap<Guid, ProxyTopic>,
}

#[derive(Debug)]
pub struct ProxyParticipant {
    pub guid: Guid,
    pub vendor: VendorId,
    pub lease: Lease,
    pub as_default: AddressSet,
    pub as_meta: AddressSet,
    pub is_ddsi2_pp: bool,
    pub minimal_bes_mode: bool,
    state: Mutex<ProxyParticipantState>,
}

impl ProxyParticipant {
    pub fn new(
        guid: Guid,
        vendor: VendorId,
        lease: Lease,
        as_default: AddressSet,
        as_meta: AddressSet,
        plist: Plist,
        seq: u64,
        implicitly_created: bool,
        is_ddsi2_pp: bool,
        minimal_bes_mode: bool,
    ) -> Self {
        ProxyParticipant {
            guid,
            vendor,
            lease,
            as_default,
            as_meta,
            is_ddsi2_pp,
            minimal_bes_mode,
            state: Mutex::new(ProxyParticipantState {
                plist,
                implicitly_created,
                seq,
                privileged_pp_guid: None,
                proxy_topics: HashMap::new(),
            }),
        }
    }

    pub fn seq(&self) -> u64 {
        self.state.lock().seq
    }

    pub fn implicitly_created(&self) -> bool {
        self.state.lock().implicitly_created
    }

    pub fn privileged_pp_guid(&self) -> Option<Guid> {
        self.state.lock().privileged_pp_guid
    }

    pub fn set_privileged_pp_guid(&self, guid: Option<Guid>) {
        self.state.lock().privileged_pp_guid = guid;
    }

    /// Ordering rule (§5, invariant 2): an update is applied iff
    /// `incoming_seq > stored_seq` or the proxy was implicitly created.
    /// Returns whether the merge happened.
    pub fn apply_if_newer(&self, incoming_seq: u64, merge: impl FnOnce(&mut Plist)) -> bool {
        let mut state = self.state.lock();
        if incoming_seq > state.seq || state.implicitly_created {
            merge(&mut state.plist);
            state.seq = incoming_seq;
            state.implicitly_created = false;
            true
        } else {
            false
        }
    }

    pub fn with_plist<R>(&self, f: impl FnOnce(&Plist) -> R) -> R {
        f(&self.state.lock().plist)
    }

    pub fn insert_topic(&self, topic: ProxyTopic) {
        self.state.lock().proxy_topics.insert(topic.guid, topic);
    }

    pub fn remove_topic(&self, guid: Guid) -> Option<ProxyTopic> {
        self.state.lock().proxy_topics.remove(&guid)
    }

    pub fn get_topic(&self, guid: Guid) -> Option<ProxyTopic> {
        self.state.lock().proxy_topics.get(&guid).cloned()
    }

    pub fn topic_guids(&self) -> Vec<Guid> {
        self.state.lock().proxy_topics.keys().copied().collect()
    }
}

#[derive(Debug, Clone)]
pub struct SecurityInfo {
    pub is_secure: bool,
    pub protection_kind: u32,
}

impl Default for SecurityInfo {
    fn default() -> Self {
        SecurityInfo {
            is_secure: false,
            protection_kind: 0,
        }
    }
}

#[derive(Debug)]
pub struct ProxyWriter {
    pub guid: Guid,
    /// Bare GUID of the owning participant; resolved via the entity index.
    pub participant_guid: Guid,
    pub xqos: Mutex<Xqos>,
    pub address_set: Mutex<AddressSet>,
    pub seq: Mutex<u64>,
    pub security_info: SecurityInfo,
}

#[derive(Debug)]
pub struct ProxyReader {
    pub guid: Guid,
    pub participant_guid: Guid,
    pub xqos: Mutex<Xqos>,
    pub address_set: Mutex<AddressSet>,
    pub seq: Mutex<u64>,
    pub security_info: SecurityInfo,
    pub favours_ssm: bool,
}

#[derive(Debug, Clone)]
pub struct ProxyTopic {
    pub guid: Guid,
    pub xqos: Xqos,
    pub type_id_minimal: Option<Vec<u8>>,
    pub type_id_complete: Option<Vec<u8>>,
    pub seq: u64,
}

/// Applies the `seq` monotonicity rule (§5) at entity level for a writer
/// or reader; returns whether the caller should proceed with the update.
pub fn seq_allows_update(stored: &Mutex<u64>, incoming_seq: u64) -> bool {
    let mut seq = stored.lock();
    if incoming_seq > *seq {
        *seq = incoming_seq;
        true
    } else {
        false
    }
}
