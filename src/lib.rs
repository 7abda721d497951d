// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! # fieldsync-core
//!
//! Signed replication core for an intermittently-connected, multi-device
//! data-sync system. A device signs what it writes, a signed-record engine
//! governs what may be saved and under what identity, a batch selector
//! decides what a peer is owed next, and an import purgatory quarantines
//! whatever a peer sends that doesn't yet verify.
//!
//! Transport (HTTP/RPC), an administrative UI, and the concrete domain
//! record types riding on top of [`record::SignedRecord`] are all out of
//! scope — this crate is the trust and replication substrate underneath
//! them, not the application itself.
//!
//! ## Module map
//!
//! - [`crypto`] — RSA-PKCS1v1.5-SHA256 sign/verify, base64 codec, nonces.
//! - [`record::canonical`] — the deterministic byte string a record signs.
//! - [`record::id`] — UUIDv5 derivation for device and record ids.
//! - [`record`] — the [`record::SignedRecord`] trait and save/verify engine.
//! - [`device`] — own-device bootstrap and the device registry.
//! - [`zone`] — zones, device-zone assignment, trust-gated membership.
//! - [`sync::selector`] — the batched pull algorithm.
//! - [`sync::session`] — the nonce handshake session FSM.
//! - [`purgatory`] — quarantine-and-retry for failed imports.
//! - [`storage`] — the reference `rusqlite` persistence backend.

pub mod crypto;
pub mod device;
pub mod purgatory;
pub mod record;
pub mod storage;
pub mod sync;
pub mod zone;

pub use crypto::{CryptoError, PublicKey, Signature, SigningKeyPair};
pub use device::{Device, DeviceError, DeviceRegistry};
pub use purgatory::{ImportRegistry, PurgatoryError, PurgatoryReport};
pub use record::{Engine, FieldValue, RecordError, SignedRecord, SyncableClass, SyncableRegistry};
pub use storage::{Config, Store, StorageError};
pub use sync::{select_batch, SelectorError, SessionError, SessionState};
pub use zone::{DeviceZone, RegisteredDevicePublicKey, Zone, ZoneError};

use thiserror::Error;

/// Aggregates every module-scoped error into one type, for callers that
/// don't need to match on the specific stage that failed.
#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Zone(#[from] ZoneError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Purgatory(#[from] PurgatoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ReplicationResult<T> = Result<T, ReplicationError>;
