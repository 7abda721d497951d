// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire DTOs
//!
//! Pure `serde` data types for the session handshake and sync exchange
//! (§6). No HTTP server is implemented here — the transport carrying these
//! is explicitly out of scope; a caller serializes these into whatever
//! framework (e.g. `axum`) fronts the replication core.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::device::Device;

/// One record as it travels on the wire: `{model, pk, fields}`. `fields`
/// carries every signed field (including `signature`, `signed_by`, etc. —
/// whatever the concrete type serializes to), with references to other
/// entities rendered as the referent's id string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedRecord {
    pub model: String,
    pub pk: String,
    pub fields: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreateRequest {
    pub client_nonce: String,
    pub client_device: Device,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreateResponse {
    pub server_nonce: String,
    pub server_device: Device,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionVerifyRequest {
    pub client_nonce: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionVerifyResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDestroyRequest {
    pub client_nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDestroyResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncDownloadRequest {
    pub client_nonce: String,
    pub device_counters: Option<HashMap<String, u64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncDownloadResponse {
    pub models: Vec<SerializedRecord>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncUploadRequest {
    pub client_nonce: String,
    pub models: Vec<SerializedRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncUploadResponse {
    pub saved_model_count: usize,
    pub unsaved_model_count: usize,
}
