// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Discovery failures are never fatal to the process (see the module-level
//! docs in [`crate::spdp`] and [`crate::sedp`]): malformed, stale, or
//! vendor-incompatible packets are expected network conditions. Callers
//! match on [`DiscoveryError`] to decide whether a failure is worth logging
//! at all, not to unwind.

use std::fmt;

use crate::guid::Guid;

/// Result alias used throughout the discovery core.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Why a discovery operation did not complete.
///
/// Most variants correspond to a silent-drop or info-level-log outcome;
/// only [`DiscoveryError::FatalMissingBuiltinWriter`] indicates a bug in the
/// embedding application rather than a network condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// A required parameter (e.g. `PARTICIPANT_GUID`, `BUILTIN_ENDPOINT_SET`)
    /// was absent from an inbound parameter list.
    MissingRequiredParameter(&'static str),
    /// The advertised domain id or domain tag does not match ours.
    DomainMismatch,
    /// The SEDP entity-id category did not match the payload kind.
    KindMismatch,
    /// An endpoint or topic GUID's prefix did not match the participant
    /// prefix the sample arrived from.
    PrefixMismatch,
    /// The GUID is tombstoned (recently deleted); drop silently.
    Tombstoned(Guid),
    /// The proxy could not be created because it has no reachable unicast
    /// address after address-set construction.
    EmptyAddressSet,
    /// A SEDP endpoint referenced a participant the entity index has never
    /// seen, and implicit creation was not possible or not permitted.
    UnknownParticipant(Guid),
    /// A privileged-participant dependency disappeared between the check
    /// and its use; the dependent proxy was deleted as a result.
    DependencyRaceLost(Guid),
    /// A locally assembled payload failed to serialize and was not sent.
    SerializationRejected(&'static str),
    /// A deserialization failure the caller should not log above trace
    /// level, because the returned code indicates an unrecognized
    /// feature-gated parameter rather than a malformed packet.
    Unsupported,
    /// A local participant has no builtin writer of the kind an outbound
    /// operation needs. This indicates an internal consistency bug in the
    /// caller, not a network condition.
    FatalMissingBuiltinWriter(&'static str),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequiredParameter(name) => {
                write!(f, "missing required parameter: {name}")
            }
            Self::DomainMismatch => write!(f, "domain id or domain tag mismatch"),
            Self::KindMismatch => write!(f, "entity kind does not match payload category"),
            Self::PrefixMismatch => write!(f, "endpoint/topic guid prefix does not match source participant"),
            Self::Tombstoned(guid) => write!(f, "guid {guid} is tombstoned"),
            Self::EmptyAddressSet => write!(f, "address set has no reachable unicast locator"),
            Self::UnknownParticipant(guid) => write!(f, "unknown participant {guid}"),
            Self::DependencyRaceLost(guid) => {
                write!(f, "privileged participant {guid} disappeared")
            }
            Self::SerializationRejected(reason) => write!(f, "serialization rejected: {reason}"),
            Self::Unsupported => write!(f, "unsupported parameter (feature-gated)"),
            Self::FatalMissingBuiltinWriter(kind) => {
                write!(f, "no local builtin writer of kind {kind}")
            }
        }
    }
}

impl std::error::Error for DiscoveryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_guid() {
        let guid = Guid::zero();
        let err = DiscoveryError::UnknownParticipant(guid);
        assert!(err.to_string().contains("unknown participant"));
    }

    #[test]
    fn fatal_variant_names_the_writer_kind() {
        let err = DiscoveryError::FatalMissingBuiltinWriter("SPDP");
        assert_eq!(err.to_string(), "no local builtin writer of kind SPDP");
    }
}
