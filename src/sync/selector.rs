// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Batch Selector
//!
//! Given a peer's last-known counter per device, selects the next bounded
//! batch of records to send it for a zone. The window is widened ("boost")
//! only when a round would otherwise come back empty despite records still
//! being owed to some device, so a single empty-looking device never forces
//! an extra round trip when others have plenty to send.

use std::collections::HashMap;

use thiserror::Error;

use crate::record::SyncableRegistry;
use crate::storage::{Store, StorageError};
use crate::sync::wire::SerializedRecord;
use crate::zone::{self, ZoneError};

#[derive(Error, Debug)]
pub enum SelectorError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Zone(#[from] ZoneError),
}

/// Selects the next batch of records to send a peer for `zone_id`.
///
/// `device_counters` describes what the peer already has, keyed by device
/// id; `None` means "nothing, seed me from zone membership". `limit` bounds
/// the window per device per round (soft — a `boost` is added when needed
/// to avoid returning an empty batch while any device still has records
/// owed to it, see module docs).
pub fn select_batch(
    store: &Store,
    registry: &SyncableRegistry,
    zone_id: &str,
    device_counters: Option<HashMap<String, u64>>,
    limit: u64,
) -> Result<Vec<SerializedRecord>, SelectorError> {
    let mut counters = match device_counters {
        Some(given) => given,
        None => zone::zone_membership_seed(store, zone_id)?
            .into_iter()
            .map(|device_id| (device_id, 0))
            .collect(),
    };

    // Pre-materialize the key set before filtering, rather than removing
    // entries while iterating the map (Design Notes §9): drop devices that
    // neither reside in the zone nor are trusted.
    let device_ids: Vec<String> = counters.keys().cloned().collect();
    for device_id in device_ids {
        let in_zone = zone::is_device_in_zone(store, &device_id, zone_id)?;
        let trusted = store.is_device_trusted(&device_id)?;
        if !in_zone && !trusted {
            counters.remove(&device_id);
        }
    }

    let mut boost = 0u64;
    loop {
        let mut results = Vec::new();
        let mut instances_remaining = false;

        for class in registry.classes() {
            for (device_id, counter) in &counters {
                let in_zone = zone::is_device_in_zone(store, device_id, zone_id)?;
                let trusted = store.is_device_trusted(device_id)?;

                let zone_fallback_filter = if in_zone {
                    None
                } else if trusted {
                    Some(zone_id)
                } else {
                    continue;
                };

                let window_start_exclusive = *counter;
                let window_end_inclusive = counter + limit + boost;

                if store.records_exist_above(
                    class.model_tag,
                    device_id,
                    window_end_inclusive,
                    zone_fallback_filter,
                )? {
                    instances_remaining = true;
                }

                let rows = store.query_records_in_range(
                    class.model_tag,
                    device_id,
                    window_start_exclusive,
                    window_end_inclusive,
                    zone_fallback_filter,
                )?;
                results.extend(rows.into_iter().map(|envelope| SerializedRecord {
                    model: envelope.model_tag,
                    pk: envelope.id,
                    fields: envelope.fields,
                }));
            }
        }

        if !results.is_empty() || !instances_remaining {
            return Ok(results);
        }
        boost += limit;
    }
}
