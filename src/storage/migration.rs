// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Database Schema Migration Framework
//!
//! Provides versioned schema migrations with transactional safety. Each
//! migration has a version number, name, and SQL body. The runner tracks
//! applied versions in a `schema_version` table and runs pending migrations
//! in order within a single transaction.

use rusqlite::Connection;

use super::StorageError;

/// A single schema migration step.
pub struct Migration {
    /// Monotonically increasing version number (starting at 1).
    pub version: u32,
    /// Human-readable name for this migration.
    pub name: &'static str,
    /// The SQL executed to apply this migration.
    pub sql: &'static str,
}

/// Runs schema migrations against a database connection.
pub struct MigrationRunner;

impl MigrationRunner {
    /// Runs all pending migrations in a transaction.
    ///
    /// Creates the `schema_version` table if it doesn't exist, then applies
    /// any migrations whose version is greater than the current schema
    /// version. All pending migrations run within a single transaction — if
    /// any migration fails, all changes are rolled back.
    pub fn run(conn: &Connection, migrations: &[Migration]) -> Result<(), StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            );",
        )?;

        let current_version = Self::current_version(conn)?;

        let pending: Vec<&Migration> = migrations
            .iter()
            .filter(|m| m.version > current_version)
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        for window in pending.windows(2) {
            if window[0].version >= window[1].version {
                return Err(StorageError::Migration(format!(
                    "migrations are not in order: v{} before v{}",
                    window[0].version, window[1].version
                )));
            }
        }

        conn.execute_batch("BEGIN EXCLUSIVE TRANSACTION;")?;

        for migration in &pending {
            if let Err(e) = conn.execute_batch(migration.sql) {
                conn.execute_batch("ROLLBACK;")?;
                return Err(StorageError::Migration(format!(
                    "migration v{} '{}' failed: {}",
                    migration.version, migration.name, e
                )));
            }

            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system time before UNIX epoch")
                .as_secs();

            if let Err(e) = conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![migration.version, now as i64],
            ) {
                conn.execute_batch("ROLLBACK;")?;
                return Err(StorageError::Migration(format!(
                    "failed to record migration v{}: {}",
                    migration.version, e
                )));
            }
        }

        conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    /// Returns the current schema version, or 0 if no migrations have been
    /// applied.
    pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
        let table_exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        let version: Option<u32> = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap_or(None);

        Ok(version.unwrap_or(0))
    }
}

/// Returns all registered migrations in version order.
///
/// This is the single source of truth for the database schema. New
/// migrations are appended to the end of this list.
pub fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        name: "baseline_schema",
        sql: MIGRATION_V1_BASELINE,
    }]
}

const MIGRATION_V1_BASELINE: &str = "
    -- Own-device bootstrap singleton plus every known remote device.
    CREATE TABLE IF NOT EXISTS devices (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        public_key TEXT NOT NULL,
        signature TEXT NOT NULL DEFAULT '',
        is_trusted INTEGER NOT NULL DEFAULT 0,
        is_own_device INTEGER NOT NULL DEFAULT 0,
        counter_position INTEGER NOT NULL DEFAULT 0
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_devices_own
        ON devices(is_own_device) WHERE is_own_device = 1;
    CREATE INDEX IF NOT EXISTS idx_devices_public_key ON devices(public_key);

    -- Device private key material for the own device (PKCS#8, opaque blob).
    CREATE TABLE IF NOT EXISTS own_device_key (
        device_id TEXT PRIMARY KEY REFERENCES devices(id),
        pkcs8 BLOB NOT NULL
    );

    -- Zone assignment, one row per device.
    CREATE TABLE IF NOT EXISTS device_zones (
        device_id TEXT PRIMARY KEY,
        zone_id TEXT NOT NULL
    );

    -- Pre-authorized public keys that auto-register a device into a zone.
    CREATE TABLE IF NOT EXISTS registered_device_public_keys (
        public_key TEXT PRIMARY KEY,
        zone_id TEXT NOT NULL
    );

    -- Generic envelope for every syncable signed-record type. `fields` is
    -- the domain payload, opaque to the replication core.
    CREATE TABLE IF NOT EXISTS signed_records (
        model_tag TEXT NOT NULL,
        id TEXT NOT NULL,
        counter INTEGER NOT NULL,
        signed_version INTEGER NOT NULL DEFAULT 1,
        signature TEXT NOT NULL DEFAULT '',
        signed_by TEXT,
        zone TEXT,
        zone_fallback TEXT,
        deleted INTEGER NOT NULL DEFAULT 0,
        fields TEXT NOT NULL,
        PRIMARY KEY (model_tag, id)
    );

    CREATE INDEX IF NOT EXISTS idx_signed_records_signer
        ON signed_records(model_tag, signed_by, counter);
    CREATE INDEX IF NOT EXISTS idx_signed_records_zone_fallback
        ON signed_records(model_tag, zone_fallback);

    -- Sync session handshake state.
    CREATE TABLE IF NOT EXISTS sync_sessions (
        client_nonce TEXT PRIMARY KEY,
        client_device TEXT NOT NULL,
        server_nonce TEXT NOT NULL DEFAULT '',
        server_device TEXT,
        verified INTEGER NOT NULL DEFAULT 0,
        models_uploaded INTEGER NOT NULL DEFAULT 0,
        models_downloaded INTEGER NOT NULL DEFAULT 0,
        ip TEXT NOT NULL DEFAULT '',
        client_version TEXT NOT NULL DEFAULT '',
        closed INTEGER NOT NULL DEFAULT 0,
        last_touched INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_sync_sessions_last_touched
        ON sync_sessions(last_touched);

    -- Import purgatory: quarantined batches awaiting retry.
    CREATE TABLE IF NOT EXISTS purgatory (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        counter INTEGER NOT NULL,
        retry_attempts INTEGER NOT NULL DEFAULT 0,
        serialized_models TEXT NOT NULL,
        exceptions TEXT NOT NULL DEFAULT ''
    );

    CREATE INDEX IF NOT EXISTS idx_purgatory_timestamp ON purgatory(timestamp);
";
