// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Device Registry
//!
//! Own-device bootstrap, public-key-to-device lookup, and the per-device
//! monotonic counter. A device's own record is self-referential — its id is
//! derived from its own public key, and it signs itself — so bootstrap is
//! handled as a two-phase insert rather than going through the generic
//! [`crate::record::Engine`] save path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{CryptoError, PublicKey, Signature, SigningKeyPair};
use crate::record::canonical::{self, FieldValue};
use crate::record::id;
use crate::record::SignedRecord;
use crate::storage::{DeviceRow, Store, StorageError};

/// Device registry error kinds.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("own device bootstrap did not persist")]
    BootstrapFailed,
    #[error("device self-signature does not verify")]
    InvalidSelfSignature,
}

/// The wire/canonical-hashing representation of a `Device` record: its
/// identity plus self-signature. Carried over the handshake as
/// `client_device`/`server_device`; persisted in the richer `devices` table
/// rather than the generic signed-record envelope, since a device also
/// carries metadata (trust flag, own-device flag, counter) no other
/// syncable record has.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub description: String,
    pub public_key: String,
    pub signature: String,
    pub signed_by: String,
}

impl From<&DeviceRow> for Device {
    fn from(row: &DeviceRow) -> Self {
        Device {
            id: row.id.clone(),
            name: row.name.clone(),
            description: row.description.clone(),
            public_key: row.public_key.clone(),
            signature: row.signature.clone(),
            signed_by: row.id.clone(),
        }
    }
}

impl SignedRecord for Device {
    fn model_tag() -> &'static str {
        "device"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn counter(&self) -> u64 {
        0
    }

    fn set_counter(&mut self, _counter: u64) {}

    fn signature(&self) -> &str {
        &self.signature
    }

    fn set_signature(&mut self, signature: String) {
        self.signature = signature;
    }

    fn signed_by(&self) -> Option<&str> {
        Some(&self.signed_by)
    }

    fn set_signed_by(&mut self, device_id: String) {
        self.signed_by = device_id;
    }

    /// Fixed field list, exactly `[signed_version, name, description,
    /// public_key]` — no `counter` or `id`, since a device's id is derived
    /// from its own public key rather than hashed in.
    fn signable_fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("signed_version", FieldValue::Int(1)),
            ("name", FieldValue::Str(self.name.clone())),
            ("description", FieldValue::Str(self.description.clone())),
            ("public_key", FieldValue::Str(self.public_key.clone())),
        ]
    }

    /// Overrides the default ordering: the fixed list above is rendered
    /// exactly as declared, unsorted.
    fn canonical_bytes(&self) -> Vec<u8> {
        canonical::render(&self.signable_fields())
    }
}

/// Checks a device's self-signature without consulting storage — used both
/// for an own-device bootstrap sanity check and to validate a peer's device
/// record presented during the sync handshake.
pub fn verify_self_signature(device: &Device) -> bool {
    if device.signed_by != device.id || device.signature.is_empty() {
        return false;
    }
    let Ok(public_key) = PublicKey::deserialize(&device.public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_base64(&device.signature) else {
        return false;
    };
    public_key.verify(&device.canonical_bytes(), &signature)
}

/// Device registry operations over a concrete store.
pub struct DeviceRegistry<'a> {
    store: &'a Store,
}

impl<'a> DeviceRegistry<'a> {
    pub fn new(store: &'a Store) -> Self {
        DeviceRegistry { store }
    }

    /// Returns this process's own device, bootstrapping one on first call.
    ///
    /// Bootstrap is two-phase: a skeleton row is inserted with an empty
    /// signature (so the device's id, derived from its public key, is
    /// stable before the canonical bytes are computed), then the
    /// self-signature is computed and written back. `is_trusted` is set iff
    /// `is_central_authority` — only the central authority's own device is
    /// trusted by construction; every other device earns trust explicitly.
    pub fn get_own_device(
        &self,
        key: &SigningKeyPair,
        is_central_authority: bool,
        name: &str,
        description: &str,
    ) -> Result<DeviceRow, DeviceError> {
        if let Some(existing) = self.store.get_own_device()? {
            return Ok(existing);
        }

        let public_key = key.public_key_der();
        let serialized_key = public_key.serialize();
        let device_id = id::derive_device_id(&serialized_key);

        let skeleton = DeviceRow {
            id: device_id.clone(),
            name: name.to_string(),
            description: description.to_string(),
            public_key: serialized_key.clone(),
            signature: String::new(),
            is_trusted: is_central_authority,
            is_own_device: true,
            counter_position: 0,
        };
        self.store.insert_device_skeleton(&skeleton)?;
        self.store.save_own_device_key(&device_id, key.as_pkcs8())?;

        let device = Device {
            id: device_id.clone(),
            name: name.to_string(),
            description: description.to_string(),
            public_key: serialized_key,
            signature: String::new(),
            signed_by: device_id.clone(),
        };
        let signature = key.sign(&device.canonical_bytes())?;
        self.store
            .finalize_device_signature(&device_id, &signature.to_base64(), is_central_authority)?;

        self.store.get_own_device()?.ok_or(DeviceError::BootstrapFailed)
    }

    /// Atomically increments and returns the own-device counter. Returns 0
    /// if called before the own device has been bootstrapped.
    pub fn increment_and_get_counter(&self) -> Result<u64, DeviceError> {
        Ok(self.store.increment_and_get_own_counter()?)
    }

    /// Raises a remote device's recorded high-water counter to `max(current, n)`.
    pub fn set_counter_position(&self, device_id: &str, n: u64) -> Result<(), DeviceError> {
        Ok(self.store.set_counter_position(device_id, n)?)
    }

    /// Returns a device's metadata, or a fresh unsaved shell if it has
    /// never been seen before.
    pub fn get_metadata(&self, device_id: &str) -> Result<DeviceRow, DeviceError> {
        Ok(self.store.get_device(device_id)?.unwrap_or(DeviceRow {
            id: device_id.to_string(),
            name: String::new(),
            description: String::new(),
            public_key: String::new(),
            signature: String::new(),
            is_trusted: false,
            is_own_device: false,
            counter_position: 0,
        }))
    }

    /// Admits a never-before-seen device presenting a self-signed `Device`
    /// record: verifies its self-signature, then persists it untrusted and
    /// unassigned to any zone. Callers handling the sync handshake's device
    /// admission (§4.6 step 2 / §3 `RegisteredDevicePublicKey`) layer zone
    /// assignment and trust on top.
    pub fn admit_remote_device(&self, device: &Device) -> Result<DeviceRow, DeviceError> {
        if !verify_self_signature(device) {
            return Err(DeviceError::InvalidSelfSignature);
        }
        let row = DeviceRow {
            id: device.id.clone(),
            name: device.name.clone(),
            description: device.description.clone(),
            public_key: device.public_key.clone(),
            signature: device.signature.clone(),
            is_trusted: false,
            is_own_device: false,
            counter_position: 0,
        };
        self.store.insert_device_skeleton(&row)?;
        Ok(row)
    }
}
