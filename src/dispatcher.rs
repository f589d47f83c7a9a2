// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery dispatcher (component F): demultiplexes builtin-reader
//! samples by source entity-id and routes each one to SPDP (§`crate::spdp`)
//! or SEDP (§`crate::sedp`), or to an auxiliary out-of-scope handler (PMD,
//! type lookup, security) the embedding application supplies.
//!
//! This crate never parses RTPS submessages itself (§1, "out of scope");
//! `builtins_dqueue_handler` takes an already-demuxed [`RawSample`] whose
//! `payload` is either a CDR-encoded plist or absent (a key-only dispose,
//! identified by its inline `KEYHASH`).

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

use crate::domain::Domain;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::guid::{EntityId, Guid, GuidPrefix, SedpKind, VendorId};
use crate::lease::MonotonicNanos;
use crate::locator::Locator;
use crate::plist::{DeserializeContext, Plist, PlistCodec, ProtocolVersion};
use crate::sedp;
use crate::spdp;

/// Delivery-sequence tracking for the builtin writers that feed SPDP,
/// SEDP, and the auxiliary discovery protocols. Distinct from
/// [`crate::proxy::ProxyWriter`], which represents a remote *user*
/// endpoint discovered through SEDP — a builtin proxy writer is purely an
/// RTPS-level bookkeeping device and never surfaces outside this table
/// (invariant 8, §8).
#[derive(Default)]
pub struct BuiltinProxyWriters {
    next_deliv_seq_lowword: DashMap<Guid, AtomicU32>,
}

impl BuiltinProxyWriters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_deliv_seq_lowword(&self, guid: Guid) -> Option<u32> {
        self.next_deliv_seq_lowword.get(&guid).map(|v| v.load(Ordering::Relaxed))
    }

    fn advance(&self, guid: Guid, seq: u64) {
        let lowword = seq.wrapping_add(1) as u32;
        if let Some(counter) = self.next_deliv_seq_lowword.get(&guid) {
            counter.store(lowword, Ordering::Relaxed);
        } else {
            self.next_deliv_seq_lowword.insert(guid, AtomicU32::new(lowword));
        }
    }
}

/// Which discovery subsystem a builtin entity-id belongs to (§4.F,
/// "source-of-truth for dispatcher").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Spdp,
    Sedp(SedpKind),
    ParticipantMessage,
    TypeLookup,
    Security,
}

fn categorize(entity_id: EntityId) -> Option<Category> {
    match entity_id {
        EntityId::SPDP_BUILTIN_PARTICIPANT_WRITER | EntityId::SPDP_BUILTIN_PARTICIPANT_SECURE_WRITER => {
            Some(Category::Spdp)
        }
        EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER | EntityId::SEDP_BUILTIN_PUBLICATIONS_SECURE_WRITER => {
            Some(Category::Sedp(SedpKind::Writer))
        }
        EntityId::SEDP_BUILTIN_SUBSCRIPTIONS_WRITER | EntityId::SEDP_BUILTIN_SUBSCRIPTIONS_SECURE_WRITER => {
            Some(Category::Sedp(SedpKind::Reader))
        }
        EntityId::SEDP_BUILTIN_TOPIC_WRITER => Some(Category::Sedp(SedpKind::Topic)),
        EntityId::PARTICIPANT_MESSAGE_WRITER | EntityId::PARTICIPANT_MESSAGE_SECURE_WRITER => {
            Some(Category::ParticipantMessage)
        }
        EntityId::TL_SVC_REQUEST_WRITER | EntityId::TL_SVC_REPLY_WRITER => Some(Category::TypeLookup),
        EntityId::PARTICIPANT_STATELESS_MESSAGE_WRITER | EntityId::PARTICIPANT_VOLATILE_SECURE_WRITER => {
            Some(Category::Security)
        }
        _ => None,
    }
}

fn is_secure_entity_id(entity_id: EntityId) -> bool {
    entity_id.0[0] == 0xff
}

/// A builtin-reader sample already demultiplexed off the wire: flags
/// decoded, source GUID resolved, payload either a CDR plist or absent
/// for a key-only dispose carried entirely in `KEYHASH`.
pub struct RawSample {
    pub writer_entity_id: EntityId,
    pub src_guid_prefix: GuidPrefix,
    pub dst_guid_prefix: Option<GuidPrefix>,
    pub vendor_id: VendorId,
    pub protocol_version: ProtocolVersion,
    pub srcloc: Option<Locator>,
    /// `None` for a key/dispose-only sample; `Some` for a full Data/
    /// DataFrag alive sample.
    pub payload: Option<Vec<u8>>,
    /// Statusinfo bits for the sample (0 for plain alive data).
    pub statusinfo: u32,
    pub key_hash: Option<[u8; 16]>,
    /// RTPS sample sequence number (`sampleinfo.seq`).
    pub seq: u64,
}

/// External collaborator: handlers for the builtin protocols this crate
/// does not itself implement (§4.F: PMD, type lookup, DDS-Security
/// stateless/volatile). A no-op default is provided for embeddings that
/// don't need them.
pub trait AuxiliaryHandler: Send + Sync {
    fn handle_participant_message(&self, _domain: &Domain, _plist: &Plist, _statusinfo: u32) {}
    fn handle_type_lookup(&self, _domain: &Domain, _entity_id: EntityId, _raw: &[u8]) {}
    fn handle_security(&self, _domain: &Domain, _entity_id: EntityId, _raw: &[u8]) {}
}

#[derive(Debug, Default)]
pub struct NoopAuxiliaryHandler;
impl AuxiliaryHandler for NoopAuxiliaryHandler {}

/// `builtins_dqueue_handler` (§4.F): the single entry point a receive
/// thread calls for every sample delivered to a builtin reader.
///
/// Deserializes the payload (or synthesizes a key-only plist from
/// `KEYHASH`), dispatches to SPDP/SEDP/auxiliary handling by source
/// entity-id, and — regardless of whether that dispatch succeeded —
/// advances the source's builtin proxy-writer delivery sequence, except
/// for SPDP, which has no associated proxy writer (§4.F, invariant 8).
pub fn builtins_dqueue_handler(
    domain: &Domain,
    receiving_participant: Guid,
    codec: &dyn PlistCodec,
    sample: &RawSample,
    aux: &dyn AuxiliaryHandler,
    now: MonotonicNanos,
) -> DiscoveryResult<()> {
    let category = match categorize(sample.writer_entity_id) {
        Some(c) => c,
        None => {
            log::trace!("dispatcher: unknown source entity id {:?}, ignoring", sample.writer_entity_id);
            return Ok(());
        }
    };
    log::trace!(
        "dispatcher: {category:?} sample (secure={}) from {:?}",
        is_secure_entity_id(sample.writer_entity_id),
        sample.src_guid_prefix
    );

    let result = dispatch(domain, receiving_participant, codec, sample, category, aux, now);
    if let Err(ref err) = result {
        if *err != DiscoveryError::Unsupported {
            log::warn!("dispatcher: {category:?} sample from {:?} dropped: {err}", sample.src_guid_prefix);
        }
    }

    if category != Category::Spdp {
        let writer_guid = Guid {
            prefix: sample.src_guid_prefix,
            entity_id: sample.writer_entity_id,
        };
        domain.builtin_proxy_writers.advance(writer_guid, sample.seq);
    }

    result
}

fn dispatch(
    domain: &Domain,
    receiving_participant: Guid,
    codec: &dyn PlistCodec,
    sample: &RawSample,
    category: Category,
    aux: &dyn AuxiliaryHandler,
    now: MonotonicNanos,
) -> DiscoveryResult<()> {
    let alive = sample.statusinfo & (crate::plist_io::STATUSINFO_DISPOSE | crate::plist_io::STATUSINFO_UNREGISTER) == 0;

    let plist = decode_payload(codec, sample, category)?;

    match category {
        Category::Spdp => {
            if alive {
                spdp::handle_spdp_alive(
                    domain,
                    &plist,
                    sample.src_guid_prefix,
                    sample.srcloc,
                    sample.dst_guid_prefix,
                    receiving_participant,
                    now,
                    sample.seq,
                )
            } else {
                spdp::handle_spdp_dead(domain, &plist, true)
            }
        }
        Category::Sedp(kind) => {
            if alive {
                sedp::handle_sedp_alive(
                    domain,
                    &plist,
                    kind,
                    sample.src_guid_prefix,
                    sample.vendor_id,
                    sample.srcloc,
                    now,
                    sample.seq,
                )
            } else if kind == SedpKind::Topic {
                sedp::handle_sedp_dead_topic(domain, &plist)
            } else {
                sedp::handle_sedp_dead_endpoint(domain, &plist, kind)
            }
        }
        Category::ParticipantMessage => {
            aux.handle_participant_message(domain, &plist, sample.statusinfo);
            Ok(())
        }
        Category::TypeLookup => {
            if let Some(raw) = &sample.payload {
                aux.handle_type_lookup(domain, sample.writer_entity_id, raw);
            }
            Ok(())
        }
        Category::Security => {
            if let Some(raw) = &sample.payload {
                aux.handle_security(domain, sample.writer_entity_id, raw);
            }
            Ok(())
        }
    }
}

/// Decodes `sample.payload` through `codec`, or, for a key-only sample
/// (no payload), synthesizes the minimal plist the category's dead-entity
/// handler needs directly from `KEYHASH` (RTI-style dispose, §4.F).
fn decode_payload(codec: &dyn PlistCodec, sample: &RawSample, category: Category) -> DiscoveryResult<Plist> {
    if let Some(raw) = &sample.payload {
        let ctx = DeserializeContext {
            protocol_version: sample.protocol_version,
            vendor_id: sample.vendor_id,
            little_endian: true,
        };
        return codec.deserialize(raw, &ctx);
    }

    let key_hash = sample
        .key_hash
        .ok_or(DiscoveryError::MissingRequiredParameter("KEYHASH"))?;
    let guid = Guid::from_bytes(key_hash);
    Ok(match category {
        Category::Spdp => Plist::key_only_participant(guid),
        Category::Sedp(SedpKind::Topic) => Plist::key_only_topic(guid),
        Category::Sedp(SedpKind::Writer) | Category::Sedp(SedpKind::Reader) => Plist::key_only_endpoint(guid),
        Category::ParticipantMessage | Category::TypeLookup | Category::Security => Plist::key_only_endpoint(guid),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::entity_index::InMemoryEntityIndex;
    use crate::local::{NoSecurity, NoShm};
    use crate::plist::PlistBit;
    use crate::qos::DefaultQosEngine;
    use crate::scheduler::ResponseSink;
    use crate::vendor::DefaultVendorQuirkTable;
    use std::sync::Arc;

    struct NoopSink;
    impl ResponseSink for NoopSink {
        fn reschedule_earlier(&self, _participant: Guid, _at: MonotonicNanos) {}
        fn queue_directed(&self, _participant: Guid, _destination: Guid, _at: MonotonicNanos) {}
    }

    struct NoopCodec;
    impl crate::plist::PlistCodec for NoopCodec {
        fn serialize(&self, _plist: &Plist) -> DiscoveryResult<Vec<u8>> {
            Ok(vec![])
        }
        fn deserialize(&self, _bytes: &[u8], _ctx: &DeserializeContext) -> DiscoveryResult<Plist> {
            Ok(Plist::new())
        }
    }

    fn test_domain() -> Domain {
        Domain::new(
            vec![],
            DiscoveryConfig::default(),
            Arc::new(InMemoryEntityIndex::new()),
            Arc::new(DefaultVendorQuirkTable),
            Arc::new(NoopSink),
            Arc::new(DefaultQosEngine),
            Arc::new(NoSecurity),
            Arc::new(NoShm),
            Arc::new(NoopCodec),
        )
    }

    fn sample(writer_entity_id: EntityId) -> RawSample {
        RawSample {
            writer_entity_id,
            src_guid_prefix: GuidPrefix([7; 12]),
            dst_guid_prefix: None,
            vendor_id: VendorId::UNKNOWN,
            protocol_version: ProtocolVersion { major: 2, minor: 3 },
            srcloc: None,
            payload: None,
            statusinfo: 0,
            key_hash: None,
            seq: 41,
        }
    }

    #[test]
    fn unknown_entity_id_is_ignored_without_error() {
        let domain = test_domain();
        let s = sample(EntityId::UNKNOWN);
        let result = builtins_dqueue_handler(&domain, Guid::zero(), domain.plist_codec.as_ref(), &s, &NoopAuxiliaryHandler, 0);
        assert!(result.is_ok());
    }

    #[test]
    fn missing_payload_and_keyhash_is_missing_required_parameter() {
        let domain = test_domain();
        let s = sample(EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER);
        let result = builtins_dqueue_handler(&domain, Guid::zero(), domain.plist_codec.as_ref(), &s, &NoopAuxiliaryHandler, 0);
        assert_eq!(result, Err(DiscoveryError::MissingRequiredParameter("KEYHASH")));
    }

    #[test]
    fn dead_sedp_writer_via_keyhash_advances_lowword_and_succeeds_as_noop() {
        let domain = test_domain();
        let endpoint_guid = Guid {
            prefix: GuidPrefix([7; 12]),
            entity_id: EntityId([5, 5, 5, 0x03]),
        };
        let mut s = sample(EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER);
        s.statusinfo = crate::plist_io::STATUSINFO_DISPOSE | crate::plist_io::STATUSINFO_UNREGISTER;
        s.key_hash = Some(endpoint_guid.as_bytes());
        s.seq = 41;

        let result = builtins_dqueue_handler(&domain, Guid::zero(), domain.plist_codec.as_ref(), &s, &NoopAuxiliaryHandler, 0);
        assert!(result.is_ok());

        let writer_guid = Guid {
            prefix: s.src_guid_prefix,
            entity_id: s.writer_entity_id,
        };
        assert_eq!(domain.builtin_proxy_writers.next_deliv_seq_lowword(writer_guid), Some(42));
    }

    #[test]
    fn spdp_category_never_touches_builtin_proxy_writer_table() {
        let domain = test_domain();
        let mut plist = Plist::new();
        plist.domain_id = Some(0);
        plist.set_present(PlistBit::DomainId);
        let guid = Guid::participant(GuidPrefix([7; 12]));
        plist.participant_guid = Some(guid);
        plist.set_present(PlistBit::ParticipantGuid);
        plist.builtin_endpoint_set = Some(0);
        plist.set_present(PlistBit::BuiltinEndpointSet);

        let mut s = sample(EntityId::SPDP_BUILTIN_PARTICIPANT_WRITER);
        s.key_hash = Some(guid.as_bytes());
        s.statusinfo = crate::plist_io::STATUSINFO_DISPOSE | crate::plist_io::STATUSINFO_UNREGISTER;

        let _ = builtins_dqueue_handler(&domain, Guid::zero(), domain.plist_codec.as_ref(), &s, &NoopAuxiliaryHandler, 0);

        let writer_guid = Guid {
            prefix: s.src_guid_prefix,
            entity_id: s.writer_entity_id,
        };
        assert_eq!(domain.builtin_proxy_writers.next_deliv_seq_lowword(writer_guid), None);
    }

    #[test]
    fn secure_sedp_subscriptions_writer_categorizes_same_as_plain_variant() {
        assert_eq!(
            categorize(EntityId::SEDP_BUILTIN_SUBSCRIPTIONS_SECURE_WRITER),
            Some(Category::Sedp(SedpKind::Reader))
        );
        assert!(is_secure_entity_id(EntityId::SEDP_BUILTIN_SUBSCRIPTIONS_SECURE_WRITER));
        assert!(!is_secure_entity_id(EntityId::SEDP_BUILTIN_SUBSCRIPTIONS_WRITER));
    }
}
