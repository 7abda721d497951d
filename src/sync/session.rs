// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync Session FSM
//!
//! The nonce handshake two peers run to establish mutual identity before
//! exchanging any records. Conceptually four states —
//! `UNVERIFIED → CLIENT_VERIFIED → SERVER_VERIFIED → ACTIVE → CLOSED` — but
//! only the server persists session state, and only two of its transitions
//! are externally observable: a row starts unverified (`CLIENT_VERIFIED`
//! and `SERVER_VERIFIED` happen client-side and server-side respectively,
//! inside single requests, without their own persisted row), flips to
//! `ACTIVE` when [`handle_verify`] succeeds, and moves to `CLOSED` on
//! [`close`] or [`reap_stale`].

use thiserror::Error;

use crate::crypto::{CryptoError, PublicKey, Signature};
use crate::device::{self, Device, DeviceError};
use crate::storage::{now_unix, SessionRow, Store, StorageError};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("no session with this client nonce")]
    UnknownSession,
    #[error("session is closed")]
    SessionClosed,
    #[error("session not verified")]
    NotVerified,
    #[error("signature verification failed")]
    SignatureMismatch,
    #[error("device is neither known nor pre-registered for any zone")]
    UnregisteredDevice,
}

/// The session FSM's logical state, derived from persisted fields. See
/// module docs for how this maps onto the four named states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unverified,
    Active,
    Closed,
}

impl SessionState {
    pub fn of(row: &SessionRow) -> Self {
        if row.closed {
            SessionState::Closed
        } else if row.verified {
            SessionState::Active
        } else {
            SessionState::Unverified
        }
    }
}

/// The exact four-tuple every handshake signature covers:
/// `client_nonce:client_device_id:server_nonce:server_device_id`.
pub fn four_tuple(
    client_nonce: &str,
    client_device_id: &str,
    server_nonce: &str,
    server_device_id: &str,
) -> Vec<u8> {
    format!("{client_nonce}:{client_device_id}:{server_nonce}:{server_device_id}").into_bytes()
}

/// Server-side handler for `POST /session/create` (handshake step 2).
///
/// Admits the client device if it is not yet known: a device that does not
/// self-verify, or whose public key was not pre-registered for a zone, is
/// rejected outright rather than quarantined — an unauthenticated peer gets
/// no foothold to retry from.
pub fn handle_create(
    store: &Store,
    own: &device::DeviceRegistry<'_>,
    own_device_id: &str,
    own_key: &crate::crypto::SigningKeyPair,
    client_nonce: &str,
    client_device: &Device,
    ip: &str,
    client_version: &str,
) -> Result<(SessionRow, String), SessionError> {
    admit_client_device(store, own, client_device)?;

    let server_nonce = crate::crypto::random_hex_nonce();
    let tuple = four_tuple(client_nonce, &client_device.id, &server_nonce, own_device_id);
    let signature = own_key.sign(&tuple)?;

    let row = SessionRow {
        client_nonce: client_nonce.to_string(),
        client_device: client_device.id.clone(),
        server_nonce,
        server_device: Some(own_device_id.to_string()),
        verified: false,
        models_uploaded: 0,
        models_downloaded: 0,
        ip: ip.to_string(),
        client_version: client_version.to_string(),
        closed: false,
        last_touched: now_unix(),
    };
    store.create_session(&row)?;
    Ok((row, signature.to_base64()))
}

fn admit_client_device(
    store: &Store,
    own: &device::DeviceRegistry<'_>,
    client_device: &Device,
) -> Result<(), SessionError> {
    if store.get_device(&client_device.id)?.is_some() {
        return Ok(());
    }
    if !device::verify_self_signature(client_device) {
        return Err(SessionError::UnregisteredDevice);
    }
    let zone_id = store.consume_registered_public_key(&client_device.public_key)?;
    let Some(zone_id) = zone_id else {
        return Err(SessionError::UnregisteredDevice);
    };
    own.admit_remote_device(client_device)?;
    store.set_device_zone(&client_device.id, &zone_id)?;
    Ok(())
}

/// Client-side: verifies the server's signature over the four-tuple before
/// trusting anything it says. This is what makes a mutated or replayed
/// server signature refuse rather than silently proceed.
pub fn verify_server_signature(
    server_public_key: &PublicKey,
    client_nonce: &str,
    client_device_id: &str,
    server_nonce: &str,
    server_device_id: &str,
    server_signature_b64: &str,
) -> Result<(), SessionError> {
    let tuple = four_tuple(client_nonce, client_device_id, server_nonce, server_device_id);
    let signature = Signature::from_base64(server_signature_b64)
        .map_err(|_| SessionError::SignatureMismatch)?;
    if server_public_key.verify(&tuple, &signature) {
        Ok(())
    } else {
        Err(SessionError::SignatureMismatch)
    }
}

/// Server-side handler for `POST /session/verify` (handshake step 4).
/// Verifies the client's signature over the four-tuple and, on success,
/// flips the session to `verified = true`.
pub fn handle_verify(
    store: &Store,
    client_nonce: &str,
    client_signature_b64: &str,
) -> Result<(), SessionError> {
    let row = store
        .get_session(client_nonce)?
        .ok_or(SessionError::UnknownSession)?;
    if row.closed {
        return Err(SessionError::SessionClosed);
    }
    let server_device_id = row.server_device.clone().ok_or(SessionError::UnknownSession)?;
    let client_device = store
        .get_device(&row.client_device)?
        .ok_or(SessionError::UnknownSession)?;
    let client_public_key = PublicKey::deserialize(&client_device.public_key)
        .map_err(|_| SessionError::SignatureMismatch)?;

    let tuple = four_tuple(client_nonce, &row.client_device, &row.server_nonce, &server_device_id);
    let signature = Signature::from_base64(client_signature_b64)
        .map_err(|_| SessionError::SignatureMismatch)?;
    if !client_public_key.verify(&tuple, &signature) {
        return Err(SessionError::SignatureMismatch);
    }

    store.mark_session_verified(client_nonce)?;
    Ok(())
}

/// Guard every record-exchange endpoint calls first: rejects with
/// `SessionError::NotVerified` rather than changing any state.
pub fn require_verified(store: &Store, client_nonce: &str) -> Result<SessionRow, SessionError> {
    let row = store
        .get_session(client_nonce)?
        .ok_or(SessionError::UnknownSession)?;
    if row.closed {
        return Err(SessionError::SessionClosed);
    }
    if !row.verified {
        return Err(SessionError::NotVerified);
    }
    Ok(row)
}

/// Records accounting for an upload/download round once a session is
/// active, and refreshes its inactivity clock.
pub fn record_activity(
    store: &Store,
    client_nonce: &str,
    uploaded: u64,
    downloaded: u64,
) -> Result<(), SessionError> {
    Ok(store.record_session_activity(client_nonce, uploaded, downloaded)?)
}

/// Terminates a session explicitly. Its nonce must never be reused.
pub fn close(store: &Store, client_nonce: &str) -> Result<(), SessionError> {
    Ok(store.close_session(client_nonce)?)
}

/// Removes unverified sessions abandoned mid-handshake for longer than
/// `timeout_secs`. Run periodically by whatever drives the transport loop.
pub fn reap_stale(store: &Store, timeout_secs: u64) -> Result<usize, SessionError> {
    Ok(store.reap_stale_sessions(timeout_secs)?)
}
