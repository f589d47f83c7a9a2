// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Common plist I/O (component H): `write_and_fini_plist` builds a
//! serialized sample from a [`Plist`], stamps it with a timestamp and
//! statusinfo, finalizes the source plist, and hands the bytes to a
//! builtin writer's transmit path (out of scope, consumed via
//! [`BuiltinWriter`]).

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::lease::MonotonicNanos;
use crate::plist::{Plist, PlistCodec};

/// Statusinfo bit 0.
pub const STATUSINFO_DISPOSE: u32 = 0b01;
/// Statusinfo bit 1.
pub const STATUSINFO_UNREGISTER: u32 = 0b10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// `SDK_DATA`: a full alive sample.
    Alive,
    /// `SDK_KEY`: a key-only dispose/unregister sample.
    Dispose,
}

#[derive(Debug, Clone)]
pub struct SerializedPayload {
    pub bytes: Vec<u8>,
    pub timestamp: MonotonicNanos,
    pub statusinfo: u32,
}

/// External collaborator: a local participant's builtin writer transmit
/// path (§1, out of scope). `write` is expected to be the non-GC,
/// no-topic-key-tracking variant the original reserves for discovery
/// traffic.
pub trait BuiltinWriter: Send + Sync {
    fn write(&self, payload: SerializedPayload) -> DiscoveryResult<()>;
}

/// `write_and_fini_plist`: serializes `plist` via `codec`, stamps it with
/// `timestamp` and the statusinfo implied by `kind`, submits it to
/// `writer`, then releases the plist's owned fields.
pub fn write_and_fini_plist(
    codec: &dyn PlistCodec,
    writer: &dyn BuiltinWriter,
    mut plist: Plist,
    kind: SampleKind,
    timestamp: MonotonicNanos,
) -> DiscoveryResult<()> {
    let statusinfo = match kind {
        SampleKind::Alive => 0,
        SampleKind::Dispose => STATUSINFO_DISPOSE | STATUSINFO_UNREGISTER,
    };

    let bytes = match codec.serialize(&plist) {
        Ok(bytes) => bytes,
        Err(_) => {
            log::error!("outbound plist failed to serialize; payload not sent");
            plist.fini();
            return Err(DiscoveryError::SerializationRejected("plist assembly"));
        }
    };

    let result = writer.write(SerializedPayload {
        bytes,
        timestamp,
        statusinfo,
    });
    plist.fini();
    result
}
