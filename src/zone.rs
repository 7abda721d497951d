// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Zone & Trust Model
//!
//! A zone is a replication domain: a named boundary records are selected
//! for sync by. `Zone` and `DeviceZone` are themselves signed records and
//! require a trusted signer, so assigning a device to a zone — or creating
//! a zone at all — is an authority decision, not a self-service one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::canonical::FieldValue;
use crate::record::SignedRecord;
use crate::storage::{Store, StorageError};

#[derive(Error, Debug)]
pub enum ZoneError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A replication domain. Requires a trusted signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub counter: u64,
    #[serde(default = "default_signed_version")]
    pub signed_version: u32,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub signed_by: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// `signed_version` has no sensible zero value — schema version 0 doesn't
/// exist — so both `Default` and serde's missing-field fallback land on 1.
fn default_signed_version() -> u32 {
    1
}

impl Default for Zone {
    fn default() -> Self {
        Zone {
            id: String::new(),
            counter: 0,
            signed_version: default_signed_version(),
            signature: String::new(),
            signed_by: None,
            deleted: false,
            name: String::new(),
            description: String::new(),
        }
    }
}

impl SignedRecord for Zone {
    fn model_tag() -> &'static str {
        "zone"
    }

    fn requires_trusted_signature() -> bool {
        true
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn counter(&self) -> u64 {
        self.counter
    }

    fn set_counter(&mut self, counter: u64) {
        self.counter = counter;
    }

    fn signature(&self) -> &str {
        &self.signature
    }

    fn set_signature(&mut self, signature: String) {
        self.signature = signature;
    }

    fn signed_by(&self) -> Option<&str> {
        self.signed_by.as_deref()
    }

    fn set_signed_by(&mut self, device_id: String) {
        self.signed_by = Some(device_id);
    }

    fn deleted(&self) -> bool {
        self.deleted
    }

    fn signed_version(&self) -> u32 {
        self.signed_version
    }

    fn signable_fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("name", FieldValue::Str(self.name.clone())),
            ("description", FieldValue::Str(self.description.clone())),
            ("counter", FieldValue::Int(self.counter as i64)),
            ("deleted", FieldValue::Bool(self.deleted)),
        ]
    }
}

/// Assignment of a device to a zone. Requires a trusted signer; exactly one
/// zone per device at a time is enforced at the authority (last write wins
/// in storage, matching the record model's append-only-by-overwrite rule).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceZone {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub counter: u64,
    #[serde(default = "default_signed_version")]
    pub signed_version: u32,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub signed_by: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    pub device_id: String,
    pub zone_id: String,
}

impl Default for DeviceZone {
    fn default() -> Self {
        DeviceZone {
            id: String::new(),
            counter: 0,
            signed_version: default_signed_version(),
            signature: String::new(),
            signed_by: None,
            deleted: false,
            device_id: String::new(),
            zone_id: String::new(),
        }
    }
}

impl SignedRecord for DeviceZone {
    fn model_tag() -> &'static str {
        "device_zone"
    }

    fn requires_trusted_signature() -> bool {
        true
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn counter(&self) -> u64 {
        self.counter
    }

    fn set_counter(&mut self, counter: u64) {
        self.counter = counter;
    }

    fn signature(&self) -> &str {
        &self.signature
    }

    fn set_signature(&mut self, signature: String) {
        self.signature = signature;
    }

    fn signed_by(&self) -> Option<&str> {
        self.signed_by.as_deref()
    }

    fn set_signed_by(&mut self, device_id: String) {
        self.signed_by = Some(device_id);
    }

    /// A `DeviceZone` carries its zone directly — see
    /// [`crate::record::Engine::resolve_zone`], which checks this before
    /// falling back to the signer's own zone.
    fn zone(&self) -> Option<&str> {
        Some(&self.zone_id)
    }

    fn deleted(&self) -> bool {
        self.deleted
    }

    fn signed_version(&self) -> u32 {
        self.signed_version
    }

    fn signable_fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("device_id", FieldValue::Ref(self.device_id.clone())),
            ("zone_id", FieldValue::Ref(self.zone_id.clone())),
            ("counter", FieldValue::Int(self.counter as i64)),
            ("deleted", FieldValue::Bool(self.deleted)),
        ]
    }
}

/// A pre-authorization token: a public key the central authority has
/// pre-approved for a zone, consumed when a device first presents it during
/// the sync handshake. Not itself a signed record — it is an administrative
/// bootstrap aid, created out-of-band by whatever manages zone membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredDevicePublicKey {
    pub public_key: String,
    pub zone_id: String,
}

/// Whether `device_id` is directly assigned to `zone_id`.
pub fn is_device_in_zone(store: &Store, device_id: &str, zone_id: &str) -> Result<bool, ZoneError> {
    Ok(store.get_device_zone(device_id)?.as_deref() == Some(zone_id))
}

/// The device ids the batch selector should seed a pull round with for
/// `zone_id`: devices directly assigned to the zone, plus trusted devices
/// that have signed at least one record falling back to it (§4.5 step 1).
pub fn zone_membership_seed(store: &Store, zone_id: &str) -> Result<Vec<String>, ZoneError> {
    let mut members = store.list_devices_in_zone(zone_id)?;
    for fallback_signer in store.list_trusted_devices_with_fallback_to_zone(zone_id)? {
        if !members.contains(&fallback_signer) {
            members.push(fallback_signer);
        }
    }
    Ok(members)
}
