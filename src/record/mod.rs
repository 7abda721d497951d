// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Signed-Record Engine
//!
//! Save/verify lifecycle for every syncable record type, plus the UUID
//! derivation and zone-resolution rules that sit on top of a record's
//! signature. Concrete domain record types (users, groups, logs, …) are out
//! of scope for this crate; this module only knows the generic contract
//! every such type implements via [`SignedRecord`].

pub mod canonical;
pub mod id;
mod registry;

pub use canonical::FieldValue;
pub use registry::{SyncableClass, SyncableRegistry};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::crypto::{CryptoError, PublicKey, Signature, SigningKeyPair};
use crate::storage::{RecordEnvelope, Store, StorageError};

/// Signed-record engine error kinds, matching the disposition table: most
/// variants signal "quarantine this import", not "fail the whole batch".
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("record saved before own-device bootstrap completed")]
    UnregisteredDevice,
    #[error("imported record is missing signed_by")]
    UnsignedImport,
    #[error("signature verification failed")]
    SignatureMismatch,
    #[error("trust-required record signed by an untrusted device")]
    UntrustedSigner,
    #[error("referenced record not yet imported")]
    MissingForeignKey,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The contract every syncable record type implements. Records are signed
/// over [`SignedRecord::signable_fields`] (via [`SignedRecord::canonical_bytes`]),
/// persisted whole as a JSON blob, and indexed by the engine on their
/// envelope metadata (id, counter, signer, zone).
pub trait SignedRecord: Serialize + DeserializeOwned {
    /// The tag this record type is stored and queried under.
    fn model_tag() -> &'static str
    where
        Self: Sized;

    /// Whether a valid signature additionally requires `signed_by.is_trusted`.
    fn requires_trusted_signature() -> bool
    where
        Self: Sized,
    {
        false
    }

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn counter(&self) -> u64;
    fn set_counter(&mut self, counter: u64);
    fn signature(&self) -> &str;
    fn set_signature(&mut self, signature: String);
    fn signed_by(&self) -> Option<&str>;
    fn set_signed_by(&mut self, device_id: String);

    /// A zone the record carries directly (e.g. `DeviceZone.zone`). Most
    /// record types have none; zone membership then falls back to the
    /// signer's own zone, see [`Engine::resolve_zone`].
    fn zone(&self) -> Option<&str> {
        None
    }

    /// The zone a trusted signer's record is associated with when the
    /// record itself carries no zone.
    fn zone_fallback(&self) -> Option<&str> {
        None
    }

    fn deleted(&self) -> bool {
        false
    }

    /// The schema version a record was signed under. Defaults to 1; a type
    /// that stores its own `signed_version` (e.g. `Zone`) overrides this to
    /// report the stored value instead of always claiming 1.
    fn signed_version(&self) -> u32 {
        1
    }

    /// The record's domain-specific signable fields, excluding `signature`
    /// and `signed_by`. Implementors must not list `signed_version` or `id`
    /// themselves — [`canonical_bytes`](SignedRecord::canonical_bytes)
    /// injects both unconditionally, so an impl that included them here
    /// would just get them silently dropped by that injection's dedup.
    /// Order is irrelevant; `canonical_bytes` sorts it.
    fn signable_fields(&self) -> Vec<(&'static str, FieldValue)>;

    /// The exact bytes this record signs over. The default always injects
    /// `signed_version` and `id` — trusting each impl's `signable_fields` to
    /// remember them let a type that forgot sign over a truncated, spec-
    /// noncompliant message — then hoists both first and sorts the rest
    /// lexicographically. `Device` overrides this with a fixed field list
    /// instead, since its id is derived from its own public key rather than
    /// hashed in.
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut fields = self.signable_fields();
        fields.retain(|(name, _)| *name != "signed_version" && *name != "id");
        fields.push(("signed_version", FieldValue::Int(self.signed_version() as i64)));
        fields.push(("id", FieldValue::Ref(self.id().to_string())));
        canonical::render(&canonical::order_default(fields))
    }
}

/// Save/verify engine over a concrete store. Holds no record-type knowledge
/// beyond what [`SignedRecord`] exposes.
pub struct Engine<'a> {
    store: &'a Store,
}

impl<'a> Engine<'a> {
    pub fn new(store: &'a Store) -> Self {
        Engine { store }
    }

    /// Saves a record authored locally: assigns the next own-device counter,
    /// allocates a stable id if absent, signs, and persists.
    ///
    /// A new id is allocated by persisting the record once before signing
    /// (so its id is stable before the canonical bytes are computed), then
    /// persisting again with the signature filled in. Both writes must land
    /// in the same transaction at the storage layer, or the record must be
    /// treated as unsigned until the second commits.
    pub fn save_local<T: SignedRecord + Clone>(
        &self,
        own_device_id: &str,
        key: &SigningKeyPair,
        mut record: T,
    ) -> Result<T, RecordError> {
        let counter = self.store.increment_and_get_own_counter()?;
        if counter == 0 {
            return Err(RecordError::UnregisteredDevice);
        }
        record.set_counter(counter);

        if record.id().is_empty() {
            let new_id = id::derive_record_id(own_device_id, counter);
            record.set_id(new_id);
            self.persist(&record)?;
        }

        let bytes = record.canonical_bytes();
        let signature = key.sign(&bytes)?;
        record.set_signature(signature.to_base64());
        record.set_signed_by(own_device_id.to_string());
        self.persist(&record)?;
        Ok(record)
    }

    /// Saves a record received from a peer. Requires `signed_by` to be
    /// present and the signature to verify; on success, raises the signer's
    /// recorded counter high-water mark.
    pub fn save_imported<T: SignedRecord + Clone>(&self, record: T) -> Result<T, RecordError> {
        self.verify_detailed(&record)?;
        self.persist(&record)?;
        let signer = record.signed_by().expect("verified above").to_string();
        self.store.set_counter_position(&signer, record.counter())?;
        Ok(record)
    }

    /// Whether `record`'s signature verifies under its claimed signer.
    /// Never propagates an error: an unknown signer, malformed signature, or
    /// storage hiccup all simply fail verification.
    pub fn verify<T: SignedRecord>(&self, record: &T) -> bool {
        self.verify_detailed(record).is_ok()
    }

    fn verify_detailed<T: SignedRecord>(&self, record: &T) -> Result<(), RecordError> {
        let signed_by = record.signed_by().ok_or(RecordError::UnsignedImport)?;

        if T::requires_trusted_signature() && !self.store.is_device_trusted(signed_by)? {
            return Err(RecordError::UntrustedSigner);
        }

        let public_key_text = self
            .store
            .get_device_public_key(signed_by)?
            .ok_or(RecordError::MissingForeignKey)?;
        let public_key =
            PublicKey::deserialize(&public_key_text).map_err(|_| RecordError::SignatureMismatch)?;
        let signature =
            Signature::from_base64(record.signature()).map_err(|_| RecordError::SignatureMismatch)?;

        if public_key.verify(&record.canonical_bytes(), &signature) {
            Ok(())
        } else {
            Err(RecordError::SignatureMismatch)
        }
    }

    /// Resolves the zone a record belongs to: its own zone if carried
    /// directly, else its signer's zone, else — only if the signer is
    /// trusted — its `zone_fallback`, else none.
    pub fn resolve_zone<T: SignedRecord>(&self, record: &T) -> Result<Option<String>, RecordError> {
        if let Some(zone) = record.zone() {
            return Ok(Some(zone.to_string()));
        }
        let Some(signed_by) = record.signed_by() else {
            return Ok(None);
        };
        if let Some(zone) = self.store.get_device_zone(signed_by)? {
            return Ok(Some(zone));
        }
        if self.store.is_device_trusted(signed_by)? {
            return Ok(record.zone_fallback().map(|z| z.to_string()));
        }
        Ok(None)
    }

    /// Loads a record by id, if present.
    pub fn load<T: SignedRecord>(&self, id: &str) -> Result<Option<T>, RecordError> {
        match self.store.get_record(T::model_tag(), id)? {
            Some(envelope) => Ok(Some(serde_json::from_value(envelope.fields)?)),
            None => Ok(None),
        }
    }

    fn persist<T: SignedRecord>(&self, record: &T) -> Result<(), RecordError> {
        let envelope = RecordEnvelope {
            model_tag: T::model_tag().to_string(),
            id: record.id().to_string(),
            counter: record.counter(),
            signed_version: 1,
            signature: record.signature().to_string(),
            signed_by: record.signed_by().map(|s| s.to_string()),
            zone: record.zone().map(|s| s.to_string()),
            zone_fallback: record.zone_fallback().map(|s| s.to_string()),
            deleted: record.deleted(),
            fields: serde_json::to_value(record)?,
        };
        self.store.put_record(&envelope)?;
        Ok(())
    }
}
