// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Generic signed-record envelope storage.
//!
//! Concrete domain record types (users, groups, logs, …) are out of scope
//! for this crate; every syncable type is stored here as an opaque envelope
//! keyed by `(model_tag, id)`, with its domain payload carried as a JSON
//! blob the core never interprets.

use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use super::{Store, StorageError};

/// One row of the generic `signed_records` table.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEnvelope {
    pub model_tag: String,
    pub id: String,
    pub counter: u64,
    pub signed_version: u32,
    pub signature: String,
    pub signed_by: Option<String>,
    pub zone: Option<String>,
    pub zone_fallback: Option<String>,
    pub deleted: bool,
    pub fields: Value,
}

const RECORD_COLUMNS: &str =
    "model_tag, id, counter, signed_version, signature, signed_by, zone, zone_fallback, deleted, fields";

fn row_to_envelope(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordEnvelope> {
    let fields_text: String = row.get(9)?;
    let fields: Value = serde_json::from_str(&fields_text).unwrap_or(Value::Null);
    Ok(RecordEnvelope {
        model_tag: row.get(0)?,
        id: row.get(1)?,
        counter: row.get::<_, i64>(2)? as u64,
        signed_version: row.get::<_, i64>(3)? as u32,
        signature: row.get(4)?,
        signed_by: row.get(5)?,
        zone: row.get(6)?,
        zone_fallback: row.get(7)?,
        deleted: row.get::<_, i64>(8)? != 0,
        fields,
    })
}

impl Store {
    /// Inserts or overwrites a record envelope.
    pub fn put_record(&self, record: &RecordEnvelope) -> Result<(), StorageError> {
        let fields_text = serde_json::to_string(&record.fields)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO signed_records
                (model_tag, id, counter, signed_version, signature, signed_by, zone, zone_fallback, deleted, fields)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.model_tag,
                record.id,
                record.counter as i64,
                record.signed_version as i64,
                record.signature,
                record.signed_by,
                record.zone,
                record.zone_fallback,
                record.deleted as i64,
                fields_text,
            ],
        )?;
        Ok(())
    }

    /// Looks up a single record envelope by its model tag and id.
    pub fn get_record(
        &self,
        model_tag: &str,
        id: &str,
    ) -> Result<Option<RecordEnvelope>, StorageError> {
        self.conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM signed_records WHERE model_tag = ?1 AND id = ?2"),
                params![model_tag, id],
                row_to_envelope,
            )
            .optional()
            .map_err(StorageError::from)
    }

    /// Whether any record of `model_tag` signed by `signed_by` has a counter
    /// strictly greater than `threshold`. When `zone_fallback` is given, the
    /// probe is further restricted to records whose `zone_fallback` matches
    /// it (used when the signer is trusted but outside the target zone).
    ///
    /// The lower bound is exclusive throughout this module: a peer's
    /// reported counter is the highest one it has already received, so a
    /// window starting there must not re-include it. (spec.md §4.5 writes
    /// the window as closed on the low end; read literally that re-sends
    /// the peer's last record every following round, which the batch
    /// completeness property in §8 rules out — exclusive-low/inclusive-high
    /// is the reading that actually converges without duplicates.)
    pub fn records_exist_above(
        &self,
        model_tag: &str,
        signed_by: &str,
        threshold: u64,
        zone_fallback: Option<&str>,
    ) -> Result<bool, StorageError> {
        let exists: bool = match zone_fallback {
            Some(zf) => self.conn.query_row(
                "SELECT COUNT(*) > 0 FROM signed_records
                 WHERE model_tag = ?1 AND signed_by = ?2 AND counter > ?3 AND zone_fallback = ?4",
                params![model_tag, signed_by, threshold as i64, zf],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) > 0 FROM signed_records
                 WHERE model_tag = ?1 AND signed_by = ?2 AND counter > ?3",
                params![model_tag, signed_by, threshold as i64],
                |row| row.get(0),
            )?,
        };
        Ok(exists)
    }

    /// Returns every record of `model_tag` signed by `signed_by` with
    /// `counter` in `(min_counter_exclusive, max_counter_inclusive]`. See
    /// [`Store::records_exist_above`] for the `zone_fallback` filter and the
    /// exclusive/inclusive boundary rationale.
    pub fn query_records_in_range(
        &self,
        model_tag: &str,
        signed_by: &str,
        min_counter_exclusive: u64,
        max_counter_inclusive: u64,
        zone_fallback: Option<&str>,
    ) -> Result<Vec<RecordEnvelope>, StorageError> {
        let sql = match zone_fallback {
            Some(_) => format!(
                "SELECT {RECORD_COLUMNS} FROM signed_records
                 WHERE model_tag = ?1 AND signed_by = ?2 AND counter > ?3 AND counter <= ?4 AND zone_fallback = ?5
                 ORDER BY counter ASC"
            ),
            None => format!(
                "SELECT {RECORD_COLUMNS} FROM signed_records
                 WHERE model_tag = ?1 AND signed_by = ?2 AND counter > ?3 AND counter <= ?4
                 ORDER BY counter ASC"
            ),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match zone_fallback {
            Some(zf) => stmt
                .query_map(
                    params![model_tag, signed_by, min_counter_exclusive as i64, max_counter_inclusive as i64, zf],
                    row_to_envelope,
                )?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(
                    params![model_tag, signed_by, min_counter_exclusive as i64, max_counter_inclusive as i64],
                    row_to_envelope,
                )?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }
}
