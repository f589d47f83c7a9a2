// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # hdds-pdp
//!
//! Participant and endpoint discovery core for a DDS-RTPS implementation:
//! SPDP (participant discovery) and SEDP (endpoint/topic discovery),
//! the proxy entity model they populate, and the supporting address-set,
//! lease, and response-scheduling machinery.
//!
//! ## Scope
//!
//! This crate owns the *decision logic* of discovery — what to believe
//! about a remote participant or endpoint, when to create or update a
//! proxy, when to drop a malformed or stale sample. It does not own RTPS
//! wire parsing, transmit sockets, the timed-event scheduler, or the
//! GUID→entity hash table; those are consumed as traits
//! ([`plist::PlistCodec`], [`plist_io::BuiltinWriter`],
//! [`scheduler::ResponseSink`], [`entity_index::EntityIndex`]) so an
//! embedding application supplies its own.
//!
//! ## Modules
//!
//! - [`spdp`] / [`sedp`] — the inbound/outbound protocol engines
//! - [`dispatcher`] — demultiplexes builtin-reader samples to the above
//! - [`proxy`] / [`entity_index`] — the remote-entity model and its store
//! - [`addrset`] / [`build`] — address-set construction and plist assembly
//! - [`lease`] / [`tombstone`] — liveliness and deleted-participant tracking
//! - [`qos`] / [`vendor`] / [`config`] — QoS defaults, vendor interop quirks,
//!   and the configuration surface discovery consults
//! - [`scheduler`] — response staggering (`pseudo_random_delay`)
//!
//! Errors are never fatal to the host process; see [`error`] for the
//! taxonomy and which variants merit which log level.

pub mod addrset;
pub mod build;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod entity_index;
pub mod error;
pub mod guid;
pub mod lease;
pub mod local;
pub mod locator;
pub mod plist;
pub mod plist_io;
pub mod proxy;
pub mod qos;
pub mod scheduler;
pub mod sedp;
pub mod spdp;
pub mod tombstone;
pub mod vendor;

pub use domain::{Domain, LocalParticipantHandle};
pub use error::{DiscoveryError, DiscoveryResult};
pub use guid::{Guid, GuidPrefix, EntityId, SedpKind, VendorId};
