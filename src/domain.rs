// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The `Domain`: the process-wide discovery state the embedding
//! application owns (Design Notes, "global mutable state"). Every handler
//! in [`crate::spdp`] and [`crate::sedp`] takes `&Domain` explicitly
//! rather than reaching into thread-local or `static` state.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::DiscoveryConfig;
use crate::dispatcher::BuiltinProxyWriters;
use crate::entity_index::EntityIndex;
use crate::guid::Guid;
use crate::local::{LocalParticipant, SecurityCapability, ShmCapability};
use crate::locator::Interface;
use crate::plist::PlistCodec;
use crate::plist_io::BuiltinWriter;
use crate::qos::QosEngine;
use crate::scheduler::ResponseSink;
use crate::tombstone::DeletedParticipants;
use crate::vendor::VendorQuirkTable;

/// A local participant plus handles to the builtin writers its outbound
/// operations publish on.
pub struct LocalParticipantHandle {
    pub state: LocalParticipant,
    pub spdp_writer: Arc<dyn BuiltinWriter>,
    pub spdp_writer_secure: Option<Arc<dyn BuiltinWriter>>,
    pub sedp_pub_writer: Arc<dyn BuiltinWriter>,
    pub sedp_sub_writer: Arc<dyn BuiltinWriter>,
    pub sedp_topic_writer: Arc<dyn BuiltinWriter>,
}

pub struct Domain {
    pub interfaces: Vec<Interface>,
    pub config: DiscoveryConfig,
    pub entity_index: Arc<dyn EntityIndex>,
    pub tombstones: DeletedParticipants,
    pub vendor_quirks: Arc<dyn VendorQuirkTable>,
    pub response_sink: Arc<dyn ResponseSink>,
    pub qos_engine: Arc<dyn QosEngine>,
    pub security: Arc<dyn SecurityCapability>,
    pub shm: Arc<dyn ShmCapability>,
    pub plist_codec: Arc<dyn PlistCodec>,
    pub local_participants: DashMap<Guid, Arc<LocalParticipantHandle>>,
    /// Guards `is_ddsi2_pp` reassignment and other cross-participant
    /// dependency-linking sequences (§5).
    pub privileged_pp_lock: Mutex<()>,
    /// Delivery-sequence tracking for builtin (non-user) proxy writers,
    /// consulted only by [`crate::dispatcher`].
    pub builtin_proxy_writers: BuiltinProxyWriters,
}

impl Domain {
    pub fn new(
        interfaces: Vec<Interface>,
        config: DiscoveryConfig,
        entity_index: Arc<dyn EntityIndex>,
        vendor_quirks: Arc<dyn VendorQuirkTable>,
        response_sink: Arc<dyn ResponseSink>,
        qos_engine: Arc<dyn QosEngine>,
        security: Arc<dyn SecurityCapability>,
        shm: Arc<dyn ShmCapability>,
        plist_codec: Arc<dyn PlistCodec>,
    ) -> Self {
        Domain {
            interfaces,
            config,
            entity_index,
            tombstones: DeletedParticipants::default(),
            vendor_quirks,
            response_sink,
            qos_engine,
            security,
            shm,
            plist_codec,
            local_participants: DashMap::new(),
            privileged_pp_lock: Mutex::new(()),
            builtin_proxy_writers: BuiltinProxyWriters::new(),
        }
    }

    pub fn register_local_participant(&self, guid: Guid, handle: Arc<LocalParticipantHandle>) {
        self.local_participants.insert(guid, handle);
    }

    pub fn local_participant(&self, guid: Guid) -> Option<Arc<LocalParticipantHandle>> {
        self.local_participants.get(&guid).map(|e| Arc::clone(&e))
    }
}
