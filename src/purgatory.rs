// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Import Purgatory
//!
//! Quarantine-and-retry for batches of imported records that fail
//! validation — signer unknown, parent record not yet imported, signature
//! mismatch. A batch that partially fails is held whole (not split) so a
//! retry re-attempts every record in its original order; one that fully
//! succeeds drains its purgatory row.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::record::{Engine, RecordError, SignedRecord};
use crate::storage::{PurgatoryRow, Store, StorageError};
use crate::sync::wire::SerializedRecord;

#[derive(Error, Debug)]
pub enum PurgatoryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("malformed purgatory payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("no purgatory entry with id {0}")]
    NotFound(i64),
}

/// Outcome of one ingest or retry pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgatoryReport {
    pub saved_model_count: usize,
    pub unsaved_model_count: usize,
}

type Importer = Box<dyn Fn(&Store, Value) -> Result<(), String>>;

/// Maps a model tag to the closure that deserializes its JSON payload and
/// runs it through [`Engine::save_imported`]. The generic engine and
/// [`crate::record::SyncableRegistry`] only carry a type's `model_tag` and
/// trust requirement, not its Rust type — this registry is where a caller
/// supplies the missing piece, one closure per concrete domain type.
pub struct ImportRegistry {
    importers: HashMap<&'static str, Importer>,
}

impl Default for ImportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportRegistry {
    pub fn new() -> Self {
        ImportRegistry {
            importers: HashMap::new(),
        }
    }

    /// Registers the import path for `T`. Registering the same model tag
    /// twice replaces the earlier closure.
    pub fn register<T>(&mut self)
    where
        T: SignedRecord + Clone + 'static,
    {
        self.importers.insert(
            T::model_tag(),
            Box::new(|store, value| {
                let record: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
                let engine = Engine::new(store);
                engine.save_imported(record).map(|_| ()).map_err(|e| e.to_string())
            }),
        );
    }

    fn import_one(&self, store: &Store, record: &SerializedRecord) -> Result<(), String> {
        match self.importers.get(record.model.as_str()) {
            Some(importer) => importer(store, record.fields.clone()),
            None => Err(format!("no importer registered for model '{}'", record.model)),
        }
    }
}

/// Imports a batch of records, quarantining whichever ones fail.
///
/// `models` is whatever a transport adapter handed over — already a
/// `Vec<SerializedRecord>` (a pre-parsed form is accepted directly; the text
/// form spec.md mentions is the transport's concern to deserialize into
/// this before calling in).
pub fn ingest(
    store: &Store,
    registry: &ImportRegistry,
    models: Vec<SerializedRecord>,
) -> Result<PurgatoryReport, PurgatoryError> {
    ingest_against(store, registry, models, None)
}

/// Re-attempts a previously quarantined batch. Deletes the row on full
/// success; otherwise rewrites it with the still-unsaved subset and a fresh
/// error log, bumping `retry_attempts`.
pub fn retry_one(
    store: &Store,
    registry: &ImportRegistry,
    row_id: i64,
) -> Result<PurgatoryReport, PurgatoryError> {
    let row = store
        .list_purgatory_oldest_first()?
        .into_iter()
        .find(|r| r.id == row_id)
        .ok_or(PurgatoryError::NotFound(row_id))?;
    let models: Vec<SerializedRecord> = serde_json::from_str(&row.serialized_models)?;
    ingest_against(store, registry, models, Some(row))
}

/// Walks every quarantined row oldest-first and re-attempts it. Returns one
/// report per row, in the order attempted. There is no retry cap here —
/// operators wanting one can inspect `retry_attempts` on each row (exposed
/// via [`crate::storage::Store::list_purgatory_oldest_first`]) and skip
/// rows past their own threshold.
pub fn retry_all(store: &Store, registry: &ImportRegistry) -> Result<Vec<PurgatoryReport>, PurgatoryError> {
    let rows = store.list_purgatory_oldest_first()?;
    let mut reports = Vec::with_capacity(rows.len());
    for row in rows {
        let models: Vec<SerializedRecord> = serde_json::from_str(&row.serialized_models)?;
        reports.push(ingest_against(store, registry, models, Some(row))?);
    }
    Ok(reports)
}

fn ingest_against(
    store: &Store,
    registry: &ImportRegistry,
    models: Vec<SerializedRecord>,
    retrying: Option<PurgatoryRow>,
) -> Result<PurgatoryReport, PurgatoryError> {
    let mut saved_model_count = 0usize;
    let mut unsaved_models = Vec::new();
    let mut exceptions = String::new();

    for record in models {
        match registry.import_one(store, &record) {
            Ok(()) => saved_model_count += 1,
            Err(message) => {
                exceptions.push_str(&message);
                exceptions.push('\n');
                unsaved_models.push(record);
            }
        }
    }

    if !unsaved_models.is_empty() {
        let serialized = serde_json::to_string(&unsaved_models)?;
        let highest_counter = retrying.as_ref().map(|r| r.counter).unwrap_or(0).max(unsaved_models.len() as u64);
        match retrying {
            Some(row) => store.update_purgatory_entry(row.id, &serialized, &exceptions)?,
            None => {
                store.create_purgatory_entry(highest_counter, &serialized, &exceptions)?;
            }
        }
    } else if let Some(row) = retrying {
        store.delete_purgatory_entry(row.id)?;
    }

    Ok(PurgatoryReport {
        saved_model_count,
        unsaved_model_count: unsaved_models.len(),
    })
}

/// Convenience: a model-level save failure's error message, for callers
/// building their own reporting on top of [`RecordError`] directly rather
/// than through [`ingest`].
pub fn describe_record_error(err: &RecordError) -> String {
    err.to_string()
}
