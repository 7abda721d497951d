// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! UUIDv5 Identity Derivation
//!
//! Record and device ids are derived, never chosen, so that re-signing the
//! same logical record always produces the same id and a device's id is
//! recoverable from its public key alone.

use uuid::Uuid;

/// Fixed root namespace every device id is derived under. Unlike the system
/// this was distilled from (which hashed a configurable central-server
/// hostname into the namespace), this crate has no notion of a single
/// central host, so the namespace is a fixed, versioned string baked into
/// the binary.
fn root_namespace() -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, b"fieldsync-core/device-root")
}

/// Derives a record id from its signer's device id and the record's
/// per-device counter: `uuid5(UUID(signer_id), str(counter))`, rendered as
/// 32 lowercase hex characters with no dashes.
pub fn derive_record_id(signer_id: &str, counter: u64) -> String {
    let namespace = Uuid::parse_str(signer_id).unwrap_or_else(|_| root_namespace());
    let id = Uuid::new_v5(&namespace, counter.to_string().as_bytes());
    id.simple().to_string()
}

/// Derives a device id from its serialized public key:
/// `uuid5(ROOT_NAMESPACE, public_key_string)`.
pub fn derive_device_id(serialized_public_key: &str) -> String {
    let id = Uuid::new_v5(&root_namespace(), serialized_public_key.as_bytes());
    id.simple().to_string()
}
