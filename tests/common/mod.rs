// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! A minimal two-device harness: an in-memory `Store` plus a bootstrapped
//! own device, usable from either side of a simulated sync round. Shared
//! across `tests/integration` and `tests/e2e` to avoid re-deriving the
//! same bootstrap boilerplate in every file.

use fieldsync_core::crypto::SigningKeyPair;
use fieldsync_core::device::{Device, DeviceRegistry};
use fieldsync_core::record::canonical::FieldValue;
use fieldsync_core::record::SignedRecord;
use fieldsync_core::storage::{Config, DeviceRow, Store};
use serde::{Deserialize, Serialize};

/// RSA-2048 PKCS#8 keys generated offline via `openssl genpkey`, for test
/// fixtures only. A device's id is derived from its public key (§3), so two
/// simulated devices coexisting in one store need distinct keys; a single
/// solo-device test can reuse [`TEST_PKCS8`] freely.
const TEST_PKCS8: &[u8] = include_bytes!("../../src/crypto/testdata/test_key.pkcs8");
const TEST_PKCS8_ALT: &[u8] = include_bytes!("../../src/crypto/testdata/test_key2.pkcs8");

/// One simulated device: its store, its signing key, and its bootstrapped
/// own-device row.
pub struct Harness {
    pub store: Store,
    pub key: SigningKeyPair,
    pub own: DeviceRow,
}

impl Harness {
    /// Bootstraps a fresh in-memory device under the shared fixture key.
    /// `is_central_authority` controls whether the own device starts out
    /// trusted. Only safe when a scenario has a single simulated device —
    /// use [`Harness::new_peer`] for a second device that will coexist with
    /// this one (e.g. admitted into the same store), since a device's id is
    /// derived from its public key and two devices sharing a key would
    /// collide.
    pub fn new(name: &str, is_central_authority: bool) -> Self {
        Self::with_key(name, is_central_authority, TEST_PKCS8)
    }

    /// Bootstraps a second simulated device under a distinct fixture key, so
    /// it can be admitted into another harness's store without colliding on
    /// device id.
    pub fn new_peer(name: &str, is_central_authority: bool) -> Self {
        Self::with_key(name, is_central_authority, TEST_PKCS8_ALT)
    }

    fn with_key(name: &str, is_central_authority: bool, pkcs8: &[u8]) -> Self {
        let store = Store::in_memory(Config {
            is_central_authority,
            ..Config::default()
        })
        .expect("in-memory store should open");
        let key = SigningKeyPair::from_pkcs8(pkcs8.to_vec()).expect("fixture key should load");
        let registry = DeviceRegistry::new(&store);
        let own = registry
            .get_own_device(&key, is_central_authority, name, "")
            .expect("bootstrap should succeed");
        Harness { store, key, own }
    }

    pub fn device(&self) -> Device {
        Device::from(&self.own)
    }

    /// Admits `other`'s device into this harness's store, as an untrusted,
    /// zone-unassigned peer — the state a device is in immediately after
    /// presenting its self-signed record during a handshake.
    pub fn admit(&self, other: &Harness) {
        let registry = DeviceRegistry::new(&self.store);
        registry
            .admit_remote_device(&other.device())
            .expect("peer self-signature should verify");
    }
}

/// A minimal syncable record type, standing in for a real domain record
/// (a user profile, a log entry, …) across the tests below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub counter: u64,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub signed_by: Option<String>,
    #[serde(default)]
    pub zone_fallback: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    pub body: String,
}

impl Note {
    pub fn new(body: &str) -> Self {
        Note {
            id: String::new(),
            counter: 0,
            signature: String::new(),
            signed_by: None,
            zone_fallback: None,
            deleted: false,
            body: body.to_string(),
        }
    }
}

impl SignedRecord for Note {
    fn model_tag() -> &'static str {
        "note"
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
    fn zone_fallback(&self) -> Option<&str> {
        self.zone_fallback.as_deref()
    }
    fn deleted(&self) -> bool {
        self.deleted
    }
    fn signable_fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![("body", FieldValue::Str(self.body.clone()))]
    }
}
