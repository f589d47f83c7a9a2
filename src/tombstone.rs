// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The `DeletedParticipants` tombstone table (§3): bounded, keyed by
//! `guid × kind`, suppressing recreation races for recently-deleted
//! entities. Bounded by capacity (LRU eviction) rather than a wall-clock
//! TTL — see `SPEC_FULL.md` §3 for why a TTL-only table (as used for the
//! gossip-loop table this is patterned after) is the wrong bound here.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::guid::Guid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TombstoneKind {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key(Guid, TombstoneKind);

pub struct DeletedParticipants {
    table: Mutex<LruCache<Key, ()>>,
}

impl DeletedParticipants {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        DeletedParticipants {
            table: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn mark(&self, guid: Guid, kind: TombstoneKind) {
        self.table.lock().put(Key(guid, kind), ());
    }

    pub fn is_tombstoned(&self, guid: Guid, kind: TombstoneKind) -> bool {
        self.table.lock().contains(&Key(guid, kind))
    }
}

impl Default for DeletedParticipants {
    fn default() -> Self {
        DeletedParticipants::with_capacity(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_and_queries_independently_by_kind() {
        let table = DeletedParticipants::with_capacity(8);
        let guid = Guid::participant(crate::guid::GuidPrefix([1; 12]));
        assert!(!table.is_tombstoned(guid, TombstoneKind::Remote));
        table.mark(guid, TombstoneKind::Remote);
        assert!(table.is_tombstoned(guid, TombstoneKind::Remote));
        assert!(!table.is_tombstoned(guid, TombstoneKind::Local));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let table = DeletedParticipants::with_capacity(2);
        let g1 = Guid::participant(crate::guid::GuidPrefix([1; 12]));
        let g2 = Guid::participant(crate::guid::GuidPrefix([2; 12]));
        let g3 = Guid::participant(crate::guid::GuidPrefix([3; 12]));
        table.mark(g1, TombstoneKind::Remote);
        table.mark(g2, TombstoneKind::Remote);
        table.mark(g3, TombstoneKind::Remote);
        assert!(!table.is_tombstoned(g1, TombstoneKind::Remote));
        assert!(table.is_tombstoned(g3, TombstoneKind::Remote));
    }
}
