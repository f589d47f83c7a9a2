// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entity index contract (§1, "out of scope") and a reference in-memory
//! implementation grounded on the corpus's `EndpointRegistry` pattern
//! (a shared map behind a lock), generalized to every entity kind this
//! core creates or looks up, and to `dashmap` for lock-free-read
//! concurrent access matching the per-entity-mutex model of §5 (the index
//! itself is not one of the per-entity locks; it only hands out `Arc`
//! handles to entities that carry their own locks).

use std::sync::Arc;

use dashmap::DashMap;

use crate::guid::{Guid, GuidPrefix};
use crate::proxy::{ProxyParticipant, ProxyReader, ProxyTopic, ProxyWriter};

/// Reason recorded when a proxy participant is deleted, for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteReason {
    Unregistered,
    LeaseExpired,
    DependencyRace,
}

/// External collaborator: the GUID→entity hash table (§1). The discovery
/// core never iterates raw storage; every access goes through this trait
/// so an embedding application can substitute its own table (e.g. backed
/// by its own concurrency model) without this crate depending on it.
pub trait EntityIndex: Send + Sync {
    fn is_local_participant(&self, guid: Guid) -> bool;

    fn lookup_proxy_participant(&self, guid: Guid) -> Option<Arc<ProxyParticipant>>;
    fn lookup_proxy_participants_by_prefix(&self, prefix: GuidPrefix) -> Vec<Arc<ProxyParticipant>>;
    fn new_proxy_participant(&self, pp: Arc<ProxyParticipant>) -> bool;
    fn delete_proxy_participant(&self, guid: Guid, reason: DeleteReason) -> bool;

    fn lookup_proxy_writer(&self, guid: Guid) -> Option<Arc<ProxyWriter>>;
    fn new_proxy_writer(&self, pwr: Arc<ProxyWriter>) -> bool;
    fn delete_proxy_writer(&self, guid: Guid) -> bool;

    fn lookup_proxy_reader(&self, guid: Guid) -> Option<Arc<ProxyReader>>;
    fn new_proxy_reader(&self, prd: Arc<ProxyReader>) -> bool;
    fn delete_proxy_reader(&self, guid: Guid) -> bool;

    fn lookup_proxy_topic(&self, participant: Guid, guid: Guid) -> Option<ProxyTopic>;
    fn delete_proxy_topic(&self, participant: Guid, guid: Guid) -> bool;
}

#[derive(Default)]
pub struct InMemoryEntityIndex {
    local_participants: DashMap<Guid, ()>,
    proxy_participants: DashMap<Guid, Arc<ProxyParticipant>>,
    proxy_writers: DashMap<Guid, Arc<ProxyWriter>>,
    proxy_readers: DashMap<Guid, Arc<ProxyReader>>,
}

impl InMemoryEntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_local_participant(&self, guid: Guid) {
        self.local_participants.insert(guid, ());
    }
}

impl EntityIndex for InMemoryEntityIndex {
    fn is_local_participant(&self, guid: Guid) -> bool {
        self.local_participants.contains_key(&guid)
    }

    fn lookup_proxy_participant(&self, guid: Guid) -> Option<Arc<ProxyParticipant>> {
        self.proxy_participants.get(&guid).map(|e| Arc::clone(&e))
    }

    fn lookup_proxy_participants_by_prefix(&self, prefix: GuidPrefix) -> Vec<Arc<ProxyParticipant>> {
        self.proxy_participants
            .iter()
            .filter(|e| e.key().prefix == prefix)
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    fn new_proxy_participant(&self, pp: Arc<ProxyParticipant>) -> bool {
        self.proxy_participants.insert(pp.guid, pp).is_none()
    }

    fn delete_proxy_participant(&self, guid: Guid, reason: DeleteReason) -> bool {
        log::info!("deleting proxy participant {guid} ({reason:?})");
        let stale_writers: Vec<Guid> = self
            .proxy_writers
            .iter()
            .filter(|e| e.value().participant_guid == guid)
            .map(|e| *e.key())
            .collect();
        for w in stale_writers {
            self.proxy_writers.remove(&w);
        }
        let stale_readers: Vec<Guid> = self
            .proxy_readers
            .iter()
            .filter(|e| e.value().participant_guid == guid)
            .map(|e| *e.key())
            .collect();
        for r in stale_readers {
            self.proxy_readers.remove(&r);
        }
        self.proxy_participants.remove(&guid).is_some()
    }

    fn lookup_proxy_writer(&self, guid: Guid) -> Option<Arc<ProxyWriter>> {
        self.proxy_writers.get(&guid).map(|e| Arc::clone(&e))
    }

    fn new_proxy_writer(&self, pwr: Arc<ProxyWriter>) -> bool {
        self.proxy_writers.insert(pwr.guid, pwr).is_none()
    }

    fn delete_proxy_writer(&self, guid: Guid) -> bool {
        self.proxy_writers.remove(&guid).is_some()
    }

    fn lookup_proxy_reader(&self, guid: Guid) -> Option<Arc<ProxyReader>> {
        self.proxy_readers.get(&guid).map(|e| Arc::clone(&e))
    }

    fn new_proxy_reader(&self, prd: Arc<ProxyReader>) -> bool {
        self.proxy_readers.insert(prd.guid, prd).is_none()
    }

    fn delete_proxy_reader(&self, guid: Guid) -> bool {
        self.proxy_readers.remove(&guid).is_some()
    }

    fn lookup_proxy_topic(&self, participant: Guid, guid: Guid) -> Option<ProxyTopic> {
        self.proxy_participants
            .get(&participant)
            .and_then(|pp| pp.get_topic(guid))
    }

    fn delete_proxy_topic(&self, participant: Guid, guid: Guid) -> bool {
        self.proxy_participants
            .get(&participant)
            .map(|pp| pp.remove_topic(guid).is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::GuidPrefix;
    use crate::lease::Lease;
    use crate::plist::Plist;
    use std::sync::Arc;

    fn mk_pp(prefix: [u8; 12]) -> Arc<ProxyParticipant> {
        let guid = Guid::participant(GuidPrefix(prefix));
        Arc::new(ProxyParticipant::new(
            guid,
            crate::guid::VendorId::UNKNOWN,
            Lease::infinite(guid),
            crate::addrset::AddressSet::empty(),
            crate::addrset::AddressSet::empty(),
            Plist::new(),
            1,
            false,
            false,
            false,
        ))
    }

    #[test]
    fn new_and_lookup_roundtrip() {
        let index = InMemoryEntityIndex::new();
        let pp = mk_pp([1; 12]);
        assert!(index.new_proxy_participant(Arc::clone(&pp)));
        assert!(index.lookup_proxy_participant(pp.guid).is_some());
        assert!(!index.new_proxy_participant(Arc::clone(&pp)));
    }

    #[test]
    fn delete_cascades_to_writers_and_readers() {
        let index = InMemoryEntityIndex::new();
        let pp = mk_pp([2; 12]);
        index.new_proxy_participant(Arc::clone(&pp));
        let wr_guid = Guid {
            prefix: pp.guid.prefix,
            entity_id: crate::guid::EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER,
        };
        let writer = Arc::new(ProxyWriter {
            guid: wr_guid,
            participant_guid: pp.guid,
            xqos: parking_lot::Mutex::new(Default::default()),
            address_set: parking_lot::Mutex::new(crate::addrset::AddressSet::empty()),
            seq: parking_lot::Mutex::new(0),
            security_info: Default::default(),
        });
        index.new_proxy_writer(writer);
        assert!(index.lookup_proxy_writer(wr_guid).is_some());
        index.delete_proxy_participant(pp.guid, DeleteReason::Unregistered);
        assert!(index.lookup_proxy_writer(wr_guid).is_none());
    }

    #[test]
    fn lookup_by_prefix_finds_siblings() {
        let index = InMemoryEntityIndex::new();
        let pp1 = mk_pp([7; 12]);
        index.new_proxy_participant(Arc::clone(&pp1));
        let found = index.lookup_proxy_participants_by_prefix(GuidPrefix([7; 12]));
        assert_eq!(found.len(), 1);
    }
}
