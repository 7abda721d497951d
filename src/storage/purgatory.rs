// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Import purgatory storage operations.

use rusqlite::params;

use super::{now_unix, Store, StorageError};

/// A row from the `purgatory` table: a batch of records that failed import
/// validation, held for retry.
#[derive(Debug, Clone, PartialEq)]
pub struct PurgatoryRow {
    pub id: i64,
    pub timestamp: i64,
    pub counter: u64,
    pub retry_attempts: u32,
    pub serialized_models: String,
    pub exceptions: String,
}

const PURGATORY_COLUMNS: &str = "id, timestamp, counter, retry_attempts, serialized_models, exceptions";

fn row_to_purgatory(row: &rusqlite::Row<'_>) -> rusqlite::Result<PurgatoryRow> {
    Ok(PurgatoryRow {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        counter: row.get::<_, i64>(2)? as u64,
        retry_attempts: row.get::<_, i64>(3)? as u32,
        serialized_models: row.get(4)?,
        exceptions: row.get(5)?,
    })
}

impl Store {
    /// Creates a new purgatory row for a batch of unsaved records, returning
    /// its assigned id.
    pub fn create_purgatory_entry(
        &self,
        counter: u64,
        serialized_models: &str,
        exceptions: &str,
    ) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO purgatory (timestamp, counter, retry_attempts, serialized_models, exceptions)
             VALUES (?1, ?2, 0, ?3, ?4)",
            params![now_unix(), counter as i64, serialized_models, exceptions],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Overwrites an existing purgatory row with a re-attempted batch,
    /// incrementing its retry count.
    pub fn update_purgatory_entry(
        &self,
        id: i64,
        serialized_models: &str,
        exceptions: &str,
    ) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE purgatory
             SET serialized_models = ?1, exceptions = ?2, retry_attempts = retry_attempts + 1, timestamp = ?3
             WHERE id = ?4",
            params![serialized_models, exceptions, now_unix(), id],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(format!("purgatory entry {id}")));
        }
        Ok(())
    }

    /// Removes a purgatory row, typically once its batch has fully saved.
    pub fn delete_purgatory_entry(&self, id: i64) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM purgatory WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Returns every purgatory row, oldest first, for a periodic retry walk.
    pub fn list_purgatory_oldest_first(&self) -> Result<Vec<PurgatoryRow>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PURGATORY_COLUMNS} FROM purgatory ORDER BY timestamp ASC"
        ))?;
        let rows = stmt
            .query_map([], row_to_purgatory)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
