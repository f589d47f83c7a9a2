// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SPDP engine (component D): periodic write, dispose/unregister, inbound
//! alive/dead handling, lease management, and DS/DDSI2 dependency
//! linking.
//!
//! Errors here are never fatal (§7): every early return is a silent drop
//! or an info/warn-level log, with the single exception of a local
//! participant missing its own builtin writer, which is an internal
//! consistency bug in the caller.

use std::sync::Arc;

use crate::addrset::addrset_from_locatorlists;
use crate::domain::Domain;
use crate::entity_index::DeleteReason;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::guid::{EntityId, Guid, GuidPrefix, VendorId};
use crate::lease::{Lease, MonotonicNanos};
use crate::locator::Locator;
use crate::plist::{Plist, PlistBit};
use crate::plist_io::{write_and_fini_plist, SampleKind};
use crate::proxy::ProxyParticipant;
use crate::tombstone::TombstoneKind;
use crate::vendor::Quirks;

/// Builtin-endpoint-set bits this engine inspects directly. Values follow
/// the RTPS 2.x `BuiltinEndpointSet_t` layout for the non-security bits;
/// the security-announcer bit is drawn from the DDS-Security builtin
/// endpoint extension range.
pub mod bes {
    pub const PARTICIPANT_ANNOUNCER: u32 = 1 << 0;
    pub const PARTICIPANT_DETECTOR: u32 = 1 << 1;
    pub const PUBLICATION_ANNOUNCER: u32 = 1 << 2;
    pub const PUBLICATION_DETECTOR: u32 = 1 << 3;
    pub const SUBSCRIPTION_ANNOUNCER: u32 = 1 << 4;
    pub const SUBSCRIPTION_DETECTOR: u32 = 1 << 5;
    pub const PARTICIPANT_MESSAGE_DATA_WRITER: u32 = 1 << 10;
    pub const PARTICIPANT_MESSAGE_DATA_READER: u32 = 1 << 11;
    pub const PARTICIPANT_SECURE_ANNOUNCER: u32 = 1 << 26;

    pub const SEDP_ANNOUNCER_MASK: u32 = PUBLICATION_ANNOUNCER | SUBSCRIPTION_ANNOUNCER;
    pub const PMD_MASK: u32 = PARTICIPANT_MESSAGE_DATA_WRITER | PARTICIPANT_MESSAGE_DATA_READER;
    pub const SECURITY_MASK: u32 = PARTICIPANT_SECURE_ANNOUNCER | (0x3f << 26);
    pub const NON_SECURITY_MASK: u32 = !SECURITY_MASK;
}

/// `spdp_write`: assembles and transmits the current SPDP payload for a
/// local participant. No-op for a local-only participant.
pub fn spdp_write(domain: &Domain, participant: Guid, now: MonotonicNanos) -> DiscoveryResult<()> {
    let handle = domain
        .local_participant(participant)
        .ok_or(DiscoveryError::FatalMissingBuiltinWriter("SPDP"))?;
    if handle.state.localness == crate::local::Localness::LocalOnly {
        return Ok(());
    }
    let plist = crate::build::build_participant_plist(
        &handle.state,
        &domain.interfaces,
        &domain.config,
        domain.security.as_ref(),
        domain.qos_engine.as_ref(),
        &Default::default(),
    );
    write_and_fini_plist(
        domain.plist_codec.as_ref(),
        handle.spdp_writer.as_ref(),
        plist,
        SampleKind::Alive,
        now,
    )
}

/// `spdp_dispose_unregister`: emits the minimal GUID-only dispose/
/// unregister plist, on both the non-secure and secure builtin writers
/// when the participant is secure.
pub fn spdp_dispose_unregister(domain: &Domain, participant: Guid, now: MonotonicNanos) -> DiscoveryResult<()> {
    let handle = domain
        .local_participant(participant)
        .ok_or(DiscoveryError::FatalMissingBuiltinWriter("SPDP"))?;

    write_and_fini_plist(
        domain.plist_codec.as_ref(),
        handle.spdp_writer.as_ref(),
        Plist::key_only_participant(participant),
        SampleKind::Dispose,
        now,
    )?;

    if let Some(secure_writer) = &handle.spdp_writer_secure {
        write_and_fini_plist(
            domain.plist_codec.as_ref(),
            secure_writer.as_ref(),
            Plist::key_only_participant(participant),
            SampleKind::Dispose,
            now,
        )?;
    }
    Ok(())
}

fn domain_matches(plist: &Plist, domain: &Domain) -> bool {
    if let Some(id) = plist.domain_id {
        if id != domain.config.domain_id {
            return false;
        }
    }
    match &plist.domain_tag {
        Some(tag) => tag == &domain.config.domain_tag,
        None => domain.config.domain_tag.is_empty(),
    }
}

fn adlink_flags(plist: &Plist) -> (bool, bool) {
    match &plist.adlink_participant_version_info {
        Some(info) => (info.ddsi2_participant_flag, info.participant_is_ddsi2),
        None => (false, false),
    }
}

/// `handle_spdp_alive`: the full inbound-alive decision tree (§4.D,
/// supplemented in `SPEC_FULL.md`). `receiving_participant` names the
/// local participant whose builtin SPDP reader delivered this sample;
/// an undirected response is scheduled against that participant's
/// periodic announcement, never against the remote one just discovered.
pub fn handle_spdp_alive(
    domain: &Domain,
    plist: &Plist,
    src_guid_prefix: GuidPrefix,
    srcloc: Option<Locator>,
    dst_guid_prefix: Option<GuidPrefix>,
    receiving_participant: Guid,
    now: MonotonicNanos,
    incoming_seq: u64,
) -> DiscoveryResult<()> {
    if !domain_matches(plist, domain) {
        return Err(DiscoveryError::DomainMismatch);
    }

    let guid = plist
        .participant_guid
        .ok_or(DiscoveryError::MissingRequiredParameter("PARTICIPANT_GUID"))?;
    let mut bes = plist
        .builtin_endpoint_set
        .ok_or(DiscoveryError::MissingRequiredParameter("BUILTIN_ENDPOINT_SET"))?;

    let vendor = plist.vendor_id.unwrap_or(VendorId::UNKNOWN);
    let quirks = domain.vendor_quirks.quirks_for(vendor);
    if quirks.contains(Quirks::SYNTHESIZE_PMD_BITS)
        && bes & bes::PMD_MASK == 0
        && domain.config.assume_rti_has_pmd_endpoints
    {
        bes |= bes::PMD_MASK;
    }

    if domain.tombstones.is_tombstoned(guid, TombstoneKind::Remote) {
        return Err(DiscoveryError::Tombstoned(guid));
    }
    if domain.entity_index.is_local_participant(guid) {
        return Ok(());
    }

    if let Some(existing) = domain.entity_index.lookup_proxy_participant(guid) {
        existing.lease.renew(now);
        existing.apply_if_newer(incoming_seq, |stored| {
            stored.default_unicast_locators = plist.default_unicast_locators.clone();
            stored.default_multicast_locators = plist.default_multicast_locators.clone();
            stored.metatraffic_unicast_locators = plist.metatraffic_unicast_locators.clone();
            stored.metatraffic_multicast_locators = plist.metatraffic_multicast_locators.clone();
            stored.builtin_endpoint_set = Some(bes);
            stored.qos = plist.qos.clone();
        });
        return Ok(());
    }

    let has_identity_token = plist.identity_token.is_some();
    let is_secure = bes & bes::PARTICIPANT_SECURE_ANNOUNCER != 0 && has_identity_token;
    if !is_secure {
        bes &= bes::NON_SECURITY_MASK;
    }

    let (ddsi2_flag, is_ddsi2_bit) = adlink_flags(plist);
    let is_ddsi2 = ddsi2_flag && is_ddsi2_bit;

    let lease_duration = plist
        .qos
        .as_ref()
        .and_then(|q| q.liveliness.as_ref())
        .and_then(|l| l.lease_duration)
        .unwrap_or(domain.config.default_lease_duration);

    let _guard = domain.privileged_pp_lock.lock();
    let missing_sedp_bits = bes & bes::SEDP_ANNOUNCER_MASK != bes::SEDP_ANNOUNCER_MASK;
    let privileged_pp_guid = if missing_sedp_bits && src_guid_prefix != guid.prefix {
        Some(Guid::participant(src_guid_prefix))
    } else if crate::vendor::is_adlink_family(vendor) && !is_ddsi2 {
        domain
            .entity_index
            .lookup_proxy_participants_by_prefix(guid.prefix)
            .into_iter()
            .find(|pp| pp.is_ddsi2_pp)
            .map(|pp| pp.guid)
    } else {
        None
    };

    let lease = match privileged_pp_guid {
        Some(pp_guid) => Lease::infinite(pp_guid),
        None => Lease::new(guid, lease_duration, now),
    };

    let tcp_peer = domain.config.tcp_use_peeraddr_for_unicast;
    let (default_uc, default_srcloc) = if tcp_peer {
        (&[][..], srcloc)
    } else {
        (&plist.default_unicast_locators[..], srcloc)
    };
    let (as_default, _) = addrset_from_locatorlists(
        default_uc,
        &plist.default_multicast_locators,
        default_srcloc,
        None,
        &domain.interfaces,
        &domain.config,
    );

    let (meta_uc, meta_srcloc) = if tcp_peer {
        (&[][..], srcloc)
    } else {
        (&plist.metatraffic_unicast_locators[..], srcloc)
    };
    let (as_meta, _) = addrset_from_locatorlists(
        meta_uc,
        &plist.metatraffic_multicast_locators,
        meta_srcloc,
        None,
        &domain.interfaces,
        &domain.config,
    );

    if as_default.empty_uc() || as_meta.empty_uc() {
        log::warn!("dropping SPDP alive for {guid}: address set has no unicast locator");
        return Err(DiscoveryError::EmptyAddressSet);
    }

    let new_pp = Arc::new(ProxyParticipant::new(
        guid,
        vendor,
        lease,
        as_default,
        as_meta,
        plist.clone(),
        incoming_seq,
        false,
        is_ddsi2,
        matches!(domain.config.besmode, crate::config::BesMode::Minimal),
    ));
    if let Some(pp_guid) = privileged_pp_guid {
        new_pp.set_privileged_pp_guid(Some(pp_guid));
    }

    if !domain.entity_index.new_proxy_participant(Arc::clone(&new_pp)) {
        return Ok(());
    }

    let directed = dst_guid_prefix.map(|p| !p.is_unknown()).unwrap_or(false);
    if !directed {
        crate::scheduler::schedule_spdp_response(
            domain.response_sink.as_ref(),
            receiving_participant,
            guid,
            now,
            domain.config.spdp_response_delay_max,
            domain.config.unicast_response_to_spdp_messages,
        );
    }

    if is_ddsi2 {
        make_participants_dependent_on_ddsi2(domain, &new_pp, now);
    } else if let Some(pp_guid) = privileged_pp_guid {
        if domain.entity_index.lookup_proxy_participant(pp_guid).is_none() {
            log::info!("privileged participant {pp_guid} vanished during creation of {guid}; deleting");
            domain
                .entity_index
                .delete_proxy_participant(guid, DeleteReason::DependencyRace);
            return Err(DiscoveryError::DependencyRaceLost(pp_guid));
        }
    }

    Ok(())
}

/// `make_participants_dependent_on_ddsi2`: reattaches proxies that share
/// the new DDSI2 participant's prefix and are not yet privileged.
fn make_participants_dependent_on_ddsi2(domain: &Domain, ddsi2_pp: &ProxyParticipant, _now: MonotonicNanos) {
    for pp in domain
        .entity_index
        .lookup_proxy_participants_by_prefix(ddsi2_pp.guid.prefix)
    {
        if pp.guid == ddsi2_pp.guid || pp.is_ddsi2_pp {
            continue;
        }
        if pp.privileged_pp_guid().is_none() {
            pp.set_privileged_pp_guid(Some(ddsi2_pp.guid));
            pp.lease.make_infinite();
        }
    }
}

/// `handle_spdp_dead`: requires `PARTICIPANT_GUID`; deletes the proxy if
/// known.
pub fn handle_spdp_dead(domain: &Domain, plist: &Plist, deletion_allowed: bool) -> DiscoveryResult<()> {
    let guid = plist
        .participant_guid
        .ok_or(DiscoveryError::MissingRequiredParameter("PARTICIPANT_GUID"))?;

    if !deletion_allowed {
        return Ok(());
    }

    domain.tombstones.mark(guid, TombstoneKind::Remote);
    if domain
        .entity_index
        .delete_proxy_participant(guid, DeleteReason::Unregistered)
    {
        Ok(())
    } else {
        log::info!("SPDP dead for unknown participant {guid}");
        Ok(())
    }
}

/// Convenience used by the dispatcher: the entity id a directed SPDP
/// response targets.
pub fn spdp_writer_entity_id() -> EntityId {
    EntityId::SPDP_BUILTIN_PARTICIPANT_WRITER
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::entity_index::InMemoryEntityIndex;
    use crate::guid::VendorId;
    use crate::local::{NoSecurity, NoShm};
    use crate::plist::{DeserializeContext, PlistCodec};
    use crate::qos::DefaultQosEngine;
    use crate::scheduler::ResponseSink;
    use crate::vendor::DefaultVendorQuirkTable;
    use parking_lot::Mutex as PMutex;

    struct NoopCodec;
    impl PlistCodec for NoopCodec {
        fn serialize(&self, _p: &Plist) -> DiscoveryResult<Vec<u8>> {
            Ok(vec![])
        }
        fn deserialize(&self, _b: &[u8], _c: &DeserializeContext) -> DiscoveryResult<Plist> {
            Ok(Plist::new())
        }
    }

    struct RecordingSink {
        scheduled: PMutex<Vec<(Guid, Guid)>>,
    }
    impl ResponseSink for RecordingSink {
        fn reschedule_earlier(&self, participant: Guid, _at: u64) {
            self.scheduled.lock().push((participant, participant));
        }
        fn queue_directed(&self, participant: Guid, destination: Guid, _at: u64) {
            self.scheduled.lock().push((participant, destination));
        }
    }

    fn test_domain() -> (Domain, Arc<RecordingSink>) {
        let iface = crate::locator::Interface {
            loc: mkloc(192, 0, 2, 5, 7410),
            extloc: mkloc(192, 0, 2, 5, 7410),
            extmask: None,
            kind: crate::locator::LocatorKind::Udpv4,
            link_local: false,
            loopback: false,
            mc_capable: true,
            enable_spdp: true,
            index: 0,
        };
        let sink = Arc::new(RecordingSink {
            scheduled: PMutex::new(vec![]),
        });
        let domain = Domain::new(
            vec![iface],
            DiscoveryConfig::default(),
            Arc::new(InMemoryEntityIndex::new()),
            Arc::new(DefaultVendorQuirkTable),
            sink.clone(),
            Arc::new(DefaultQosEngine),
            Arc::new(NoSecurity),
            Arc::new(NoShm),
            Arc::new(NoopCodec),
        );
        (domain, sink)
    }

    fn mkloc(a: u8, b: u8, c: u8, d: u8, port: u32) -> Locator {
        let mut address = [0u8; 16];
        address[12] = a;
        address[13] = b;
        address[14] = c;
        address[15] = d;
        Locator {
            kind: crate::locator::LocatorKind::Udpv4,
            port,
            address,
        }
    }

    fn local_guid() -> Guid {
        Guid::participant(GuidPrefix([0xAA; 12]))
    }

    fn s1_plist() -> Plist {
        let mut plist = Plist::new();
        let guid = Guid::from_bytes([
            0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0xc1,
        ]);
        plist.participant_guid = Some(guid);
        plist.set_present(PlistBit::ParticipantGuid);
        plist.builtin_endpoint_set = Some(0x3ff);
        plist.set_present(PlistBit::BuiltinEndpointSet);
        plist.vendor_id = Some(VendorId(0x0110));
        plist.set_present(PlistBit::VendorId);
        plist.domain_id = Some(0);
        plist.set_present(PlistBit::DomainId);
        plist.default_unicast_locators = vec![mkloc(192, 0, 2, 5, 7410)];
        plist.set_present(PlistBit::DefaultUnicastLocator);
        plist.metatraffic_unicast_locators = vec![mkloc(192, 0, 2, 5, 7410)];
        plist.set_present(PlistBit::MetatrafficUnicastLocator);
        plist
    }

    #[test]
    fn s1_spdp_alive_creates_proxy_and_schedules_response() {
        let (domain, sink) = test_domain();
        let plist = s1_plist();
        let guid = plist.participant_guid.unwrap();
        let src = mkloc(192, 0, 2, 5, 7400);

        let result = handle_spdp_alive(&domain, &plist, guid.prefix, Some(src), None, local_guid(), 0, 1);
        assert!(result.is_ok());

        let pp = domain.entity_index.lookup_proxy_participant(guid).unwrap();
        assert_eq!(pp.as_default.len(), 1);
        assert_eq!(sink.scheduled.lock().len(), 1);
    }

    #[test]
    fn s2_secure_without_identity_token_masks_security_bits() {
        let (domain, _sink) = test_domain();
        let mut plist = s1_plist();
        plist.builtin_endpoint_set = Some(0x3ff | bes::PARTICIPANT_SECURE_ANNOUNCER);
        let guid = plist.participant_guid.unwrap();
        let src = mkloc(192, 0, 2, 5, 7400);

        handle_spdp_alive(&domain, &plist, guid.prefix, Some(src), None, local_guid(), 0, 1).unwrap();
        let pp = domain.entity_index.lookup_proxy_participant(guid).unwrap();
        let stored_bes = pp.with_plist(|p| p.builtin_endpoint_set.unwrap());
        assert_eq!(stored_bes & bes::PARTICIPANT_SECURE_ANNOUNCER, 0);
    }

    #[test]
    fn s3_spdp_dead_deletes_known_proxy() {
        let (domain, _sink) = test_domain();
        let plist = s1_plist();
        let guid = plist.participant_guid.unwrap();
        let src = mkloc(192, 0, 2, 5, 7400);
        handle_spdp_alive(&domain, &plist, guid.prefix, Some(src), None, local_guid(), 0, 1).unwrap();
        assert!(domain.entity_index.lookup_proxy_participant(guid).is_some());

        let dead = Plist::key_only_participant(guid);
        handle_spdp_dead(&domain, &dead, true).unwrap();
        assert!(domain.entity_index.lookup_proxy_participant(guid).is_none());
    }

    #[test]
    fn spdp_dead_unknown_participant_is_a_noop() {
        let (domain, _sink) = test_domain();
        let guid = Guid::participant(GuidPrefix([0x42; 12]));
        let dead = Plist::key_only_participant(guid);
        assert!(handle_spdp_dead(&domain, &dead, true).is_ok());
    }

    #[test]
    fn missing_participant_guid_is_rejected() {
        let (domain, _sink) = test_domain();
        let plist = Plist::new();
        let err = handle_spdp_alive(&domain, &plist, GuidPrefix([0; 12]), None, None, local_guid(), 0, 1);
        assert_eq!(
            err.unwrap_err(),
            DiscoveryError::MissingRequiredParameter("PARTICIPANT_GUID")
        );
    }

    #[test]
    fn existing_proxy_is_updated_not_recreated_and_lease_is_always_renewed() {
        let (domain, sink) = test_domain();
        let plist = s1_plist();
        let guid = plist.participant_guid.unwrap();
        let src = mkloc(192, 0, 2, 5, 7400);
        handle_spdp_alive(&domain, &plist, guid.prefix, Some(src), None, local_guid(), 0, 5).unwrap();
        assert_eq!(sink.scheduled.lock().len(), 1);

        // Stale seq: lease still renews, but no second proxy and no second
        // response is scheduled (the function returns before that point).
        handle_spdp_alive(&domain, &plist, guid.prefix, Some(src), None, local_guid(), 1_000, 2).unwrap();
        assert_eq!(sink.scheduled.lock().len(), 1);
        let pp = domain.entity_index.lookup_proxy_participant(guid).unwrap();
        assert_eq!(pp.seq(), 5, "stale seq must not overwrite stored seq");
        assert!(pp.lease.expiry() > 0, "lease must have been renewed at t=1000");
    }
}
