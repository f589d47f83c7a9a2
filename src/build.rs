// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parameter-list assembly (component C): builds outbound SPDP/SEDP
//! payloads from local participant/endpoint/topic state.

use crate::addrset::AddressSet;
use crate::config::{AllowMulticast, DiscoveryConfig};
use crate::local::{EndpointCategory, LocalEndpoint, LocalParticipant, LocalTopic, SecurityCapability, ShmCapability};
use crate::locator::{Interface, Locator};
use crate::plist::{Plist, PlistBit};
use crate::qos::{QosEngine, QOS_ALL_NON_LIVELINESS, QOS_ENTITY_NAME, QOS_LIVELINESS, QOS_PROPERTY_LIST, QOS_USER_DATA};

/// Whether `include_multicast_locator_in_discovery`: SPDP multicast is
/// ASM-gated by `AllowMulticast::SPDP`, or SSM-gated when the participant
/// has been configured to prefer SSM for discovery (not modeled
/// separately here — SPDP never uses SSM in practice, so this reduces to
/// the ASM/SPDP bit).
fn include_multicast_locator_in_discovery(config: &DiscoveryConfig) -> bool {
    config.allow_multicast.contains(AllowMulticast::SPDP)
        || config.allow_multicast.contains(AllowMulticast::SPDP_ASM)
}

/// `build_participant_plist`: assembles the outbound SPDP payload from
/// local participant state and the domain's interfaces.
pub fn build_participant_plist(
    pp: &LocalParticipant,
    interfaces: &[Interface],
    config: &DiscoveryConfig,
    security: &dyn SecurityCapability,
    qos_engine: &dyn QosEngine,
    default_qos: &crate::qos::Xqos,
) -> Plist {
    let mut out = Plist::new();

    out.participant_guid = Some(pp.guid);
    out.set_present(PlistBit::ParticipantGuid);
    out.builtin_endpoint_set = Some(pp.builtin_endpoint_set);
    out.set_present(PlistBit::BuiltinEndpointSet);
    out.protocol_version = Some(pp.protocol_version);
    out.set_present(PlistBit::ProtocolVersion);
    out.vendor_id = Some(pp.vendor);
    out.set_present(PlistBit::VendorId);
    out.domain_id = Some(pp.domain_id);
    out.set_present(PlistBit::DomainId);

    // v1: DOMAIN_TAG is omitted when empty as a backward-compat sentinel —
    // peers that predate domain tagging must not see an unexpected PID.
    if !pp.domain_tag.is_empty() {
        out.domain_tag = Some(pp.domain_tag.clone());
        out.set_present(PlistBit::DomainTag);
    }

    for iface in crate::local::spdp_enabled_interfaces(interfaces) {
        out.default_unicast_locators.push(iface.loc);
        out.metatraffic_unicast_locators.push(iface.loc);
    }
    if !out.default_unicast_locators.is_empty() {
        out.set_present(PlistBit::DefaultUnicastLocator);
        out.set_present(PlistBit::MetatrafficUnicastLocator);
    }

    if include_multicast_locator_in_discovery(config) {
        for iface in interfaces.iter().filter(|i| i.mc_capable) {
            let mc = spdp_multicast_locator(iface);
            out.default_multicast_locators.push(mc);
            out.metatraffic_multicast_locators.push(mc);
        }
        if !out.default_multicast_locators.is_empty() {
            out.set_present(PlistBit::DefaultMulticastLocator);
            out.set_present(PlistBit::MetatrafficMulticastLocator);
        }
    }

    if let Some(info) = &pp.adlink_version_info {
        out.adlink_participant_version_info = Some(info.clone());
        out.set_present(PlistBit::AdlinkParticipantVersionInfo);
    }

    if security.is_active() {
        if let Some(token) = security.identity_token() {
            out.identity_token = Some(token);
            out.set_present(PlistBit::IdentityToken);
        }
        if let Some(token) = security.permissions_token() {
            out.permissions_token = Some(token);
            out.set_present(PlistBit::PermissionsToken);
        }
    }

    let qos_mask = if config.explicitly_publish_qos_set_to_default {
        QOS_ALL_NON_LIVELINESS
    } else {
        QOS_USER_DATA | QOS_ENTITY_NAME | QOS_PROPERTY_LIST | QOS_LIVELINESS
    };
    let delta = qos_engine.xqos_delta(default_qos, &pp.qos, qos_mask);
    if delta != 0 {
        let mut qos = crate::qos::Xqos::default();
        qos_engine.xqos_mergein_missing(&mut qos, &pp.qos, delta);
        out.qos = Some(qos);
        out.set_present(PlistBit::Qos);
    }

    out
}

/// SPDP's well-known multicast group per interface kind; a production
/// transport factory assigns the real group/port, this is a placeholder
/// address of the right shape for tests that don't care about the exact
/// multicast group.
fn spdp_multicast_locator(iface: &Interface) -> Locator {
    let mut address = [0u8; 16];
    address[12] = 239;
    address[13] = 255;
    address[14] = 0;
    address[15] = 1;
    Locator {
        kind: iface.kind,
        port: 7400,
        address,
    }
}

fn add_xlocator_to_ps(set: &AddressSet, out: &mut Plist) {
    let uc = set.filtered_copy(false);
    let mc = set.filtered_copy(true);
    out.unicast_locators = uc.iter().map(|x| x.locator).collect();
    out.multicast_locators = mc.iter().map(|x| x.locator).collect();
    if !out.unicast_locators.is_empty() {
        out.set_present(PlistBit::UnicastLocator);
    }
    if !out.multicast_locators.is_empty() {
        out.set_present(PlistBit::MulticastLocator);
    }
}

/// `build_endpoint_plist`: assembles the outbound SEDP payload for a
/// writer or reader.
///
/// SHM ordering contract: when the `shm` feature is active, the
/// shared-memory locator is inserted at the *front* of the unicast
/// locator list to signal higher priority to the data plane; the data
/// plane (out of scope here) is expected to prefer the first unicast
/// locator it can use.
pub fn build_endpoint_plist(
    endpoint: &LocalEndpoint,
    participant: &LocalParticipant,
    qos_engine: &dyn QosEngine,
    default_qos: &crate::qos::Xqos,
    shm: &dyn ShmCapability,
) -> Plist {
    let mut out = Plist::new();

    out.endpoint_guid = Some(endpoint.guid);
    out.set_present(PlistBit::EndpointGuid);
    out.protocol_version = Some(participant.protocol_version);
    out.set_present(PlistBit::ProtocolVersion);
    out.vendor_id = Some(participant.vendor);
    out.set_present(PlistBit::VendorId);

    if let Some(group) = endpoint.group_guid {
        out.group_guid = Some(group);
        out.set_present(PlistBit::GroupGuid);
    }

    if endpoint.category == EndpointCategory::Reader && endpoint.requests_keyhash {
        // CYCLONE_REQUESTS_KEYHASH: experimental vendor PID, tracked via
        // `status_info`-adjacent bit rather than a dedicated field since
        // this crate models only the plist fields the algorithms branch
        // on, not the full PID catalog.
        out.status_info = Some(out.status_info.unwrap_or(0) | 0x1000_0000);
        out.set_present(PlistBit::StatusInfo);
    }

    add_xlocator_to_ps(&endpoint.address_set, &mut out);

    if shm.is_active() {
        if let Some(shm_loc) = shm.shm_locator() {
            out.unicast_locators.insert(0, shm_loc);
            out.set_present(PlistBit::UnicastLocator);
        }
    }

    if out.unicast_locators.is_empty() && out.multicast_locators.is_empty() {
        // Synthesize the participant's own locators when the endpoint has
        // none of its own (§4.C).
        add_xlocator_to_ps(&participant.address_set, &mut out);
    }

    let mask = if endpoint.category == EndpointCategory::Writer {
        crate::qos::QOS_RELIABILITY | crate::qos::QOS_DURABILITY | QOS_USER_DATA
    } else {
        crate::qos::QOS_RELIABILITY | crate::qos::QOS_DURABILITY | QOS_USER_DATA
    };
    let delta = qos_engine.xqos_delta(default_qos, &endpoint.qos, mask);
    let mut qos = crate::qos::Xqos::default();
    qos_engine.xqos_mergein_missing(&mut qos, &endpoint.qos, delta | crate::qos::QOS_RELIABILITY | crate::qos::QOS_DURABILITY);
    out.qos = Some(qos);
    out.set_present(PlistBit::Qos);

    out
}

/// `build_topic_plist`: assembles the outbound SEDP topic payload.
pub fn build_topic_plist(
    topic: &LocalTopic,
    participant: &LocalParticipant,
    qos_engine: &dyn QosEngine,
    default_qos: &crate::qos::Xqos,
) -> Plist {
    let mut out = Plist::new();
    out.topic_guid = Some(topic.guid);
    out.set_present(PlistBit::TopicGuid);
    out.protocol_version = Some(participant.protocol_version);
    out.set_present(PlistBit::ProtocolVersion);
    out.vendor_id = Some(participant.vendor);
    out.set_present(PlistBit::VendorId);

    if let Some(ti) = &topic.type_information {
        out.type_information = Some(ti.clone());
        out.set_present(PlistBit::TypeInformation);
    }

    let delta = qos_engine.xqos_delta(default_qos, &topic.qos, crate::qos::QOS_ALL);
    if delta != 0 {
        let mut qos = crate::qos::Xqos::default();
        qos_engine.xqos_mergein_missing(&mut qos, &topic.qos, delta);
        out.qos = Some(qos);
        out.set_present(PlistBit::Qos);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::{Guid, GuidPrefix, VendorId};
    use crate::local::{NoSecurity, NoShm};
    use crate::plist::ProtocolVersion;
    use crate::qos::DefaultQosEngine;

    fn participant() -> LocalParticipant {
        LocalParticipant {
            guid: Guid::participant(GuidPrefix([1; 12])),
            vendor: VendorId(0x01AA),
            protocol_version: ProtocolVersion { major: 2, minor: 3 },
            domain_id: 0,
            domain_tag: String::new(),
            localness: crate::local::Localness::Networked,
            builtin_endpoint_set: 0x3ff,
            qos: Default::default(),
            adlink_version_info: None,
            receive_buffer_size: None,
            address_set: AddressSet::empty(),
        }
    }

    #[test]
    fn participant_plist_omits_empty_domain_tag() {
        let pp = participant();
        let config = DiscoveryConfig::default();
        let plist = build_participant_plist(
            &pp,
            &[],
            &config,
            &NoSecurity,
            &DefaultQosEngine,
            &Default::default(),
        );
        assert!(!plist.has(PlistBit::DomainTag));
        assert!(plist.has(PlistBit::ParticipantGuid));
        assert!(plist.has(PlistBit::BuiltinEndpointSet));
    }

    #[test]
    fn participant_plist_includes_domain_tag_when_set() {
        let mut pp = participant();
        pp.domain_tag = "staging".into();
        let config = DiscoveryConfig::default();
        let plist = build_participant_plist(
            &pp,
            &[],
            &config,
            &NoSecurity,
            &DefaultQosEngine,
            &Default::default(),
        );
        assert!(plist.has(PlistBit::DomainTag));
        assert_eq!(plist.domain_tag.as_deref(), Some("staging"));
    }

    #[test]
    fn endpoint_plist_splits_addresses_by_multicast() {
        use crate::addrset::XLocator;
        use crate::locator::LocatorKind;
        use std::collections::HashSet;

        let mut uc_addr = [0u8; 16];
        uc_addr[15] = 1;
        let mut mc_addr = [0u8; 16];
        mc_addr[12] = 239;

        let mut set = HashSet::new();
        set.insert(XLocator {
            conn: 0,
            locator: Locator {
                kind: LocatorKind::Udpv4,
                port: 7410,
                address: uc_addr,
            },
        });
        set.insert(XLocator {
            conn: 0,
            locator: Locator {
                kind: LocatorKind::Udpv4,
                port: 7401,
                address: mc_addr,
            },
        });

        let endpoint = LocalEndpoint {
            guid: Guid::zero(),
            participant_guid: Guid::zero(),
            category: EndpointCategory::Writer,
            group_guid: None,
            qos: Default::default(),
            address_set: AddressSet::from_set(set),
            requests_keyhash: false,
            favours_ssm: false,
        };
        let pp = participant();
        let plist = build_endpoint_plist(
            &endpoint,
            &pp,
            &DefaultQosEngine,
            &Default::default(),
            &NoShm,
        );
        assert_eq!(plist.unicast_locators.len(), 1);
        assert_eq!(plist.multicast_locators.len(), 1);
    }
}
