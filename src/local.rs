// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Local participant/endpoint/topic state: the inputs plist assembly reads
//! from. This is the minimal slice of "the rest of the DDS stack" that
//! §4.C's builders need; ownership of the full local entity model belongs
//! to the embedding application.

use crate::addrset::AddressSet;
use crate::guid::{Guid, VendorId};
use crate::locator::Interface;
use crate::plist::{AdlinkVersionInfo, ProtocolVersion};
use crate::qos::Xqos;

/// Capability objects (Design Notes, §9): each discovery operation
/// consults one of these rather than checking a compile-time feature
/// flag. The default is a no-op; a full implementation supplies the
/// feature's behavior.
pub trait SecurityCapability: Send + Sync {
    fn identity_token(&self) -> Option<Vec<u8>> {
        None
    }
    fn permissions_token(&self) -> Option<Vec<u8>> {
        None
    }
    fn is_active(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct NoSecurity;
impl SecurityCapability for NoSecurity {}

/// Shared-memory locator synthesis (§4.C, §9 Open Questions). Disabled by
/// default; the data plane's ordering contract with a "prepended" SHM
/// locator is documented on [`crate::build::build_endpoint_plist`] and is
/// not enforced here.
pub trait ShmCapability: Send + Sync {
    fn shm_locator(&self) -> Option<crate::locator::Locator> {
        None
    }
    fn is_active(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct NoShm;
impl ShmCapability for NoShm {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Localness {
    LocalOnly,
    Networked,
}

pub struct LocalParticipant {
    pub guid: Guid,
    pub vendor: VendorId,
    pub protocol_version: ProtocolVersion,
    pub domain_id: u32,
    pub domain_tag: String,
    pub localness: Localness,
    pub builtin_endpoint_set: u32,
    pub qos: Xqos,
    pub adlink_version_info: Option<AdlinkVersionInfo>,
    pub receive_buffer_size: Option<u32>,
    /// The participant's own default address set, used to synthesize
    /// locators into an endpoint plist that would otherwise advertise
    /// none (§4.C).
    pub address_set: AddressSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointCategory {
    Writer,
    Reader,
}

pub struct LocalEndpoint {
    pub guid: Guid,
    pub participant_guid: Guid,
    pub category: EndpointCategory,
    pub group_guid: Option<Guid>,
    pub qos: Xqos,
    pub address_set: AddressSet,
    pub requests_keyhash: bool,
    pub favours_ssm: bool,
}

pub struct LocalTopic {
    pub guid: Guid,
    pub qos: Xqos,
    pub type_information: Option<Vec<u8>>,
}

/// Interfaces declaring `enable_spdp`; only these are eligible to
/// contribute default/metatraffic unicast locators (§4.C).
pub fn spdp_enabled_interfaces(interfaces: &[Interface]) -> impl Iterator<Item = &Interface> {
    interfaces.iter().filter(|i| i.enable_spdp)
}
