// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persistent Storage Module
//!
//! The reference persistence backend: a single SQLite database holding the
//! device registry, zone/trust tables, the generic signed-record envelope
//! table, sync sessions, and the import purgatory.

#[cfg(feature = "testing")]
pub mod device;
#[cfg(not(feature = "testing"))]
mod device;

#[cfg(feature = "testing")]
pub mod purgatory;
#[cfg(not(feature = "testing"))]
mod purgatory;

#[cfg(feature = "testing")]
pub mod records;
#[cfg(not(feature = "testing"))]
mod records;

#[cfg(feature = "testing")]
pub mod session;
#[cfg(not(feature = "testing"))]
mod session;

#[cfg(feature = "testing")]
pub mod zone;
#[cfg(not(feature = "testing"))]
mod zone;

pub mod migration;

pub use device::DeviceRow;
pub use purgatory::PurgatoryRow;
pub use records::RecordEnvelope;
pub use session::SessionRow;

use rusqlite::Connection;
use std::path::Path;

pub use error::StorageError;
mod error;

/// Process-wide configuration for a `Store`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether this process acts as the central authority — a newly
    /// bootstrapped own device is trusted iff this is set.
    pub is_central_authority: bool,
    /// Default soft limit for the batch selector.
    pub default_limit: u64,
    /// Inactivity window after which an unverified sync session is reaped.
    pub session_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            is_central_authority: false,
            default_limit: 100,
            session_timeout_secs: 300,
        }
    }
}

/// SQLite-based storage implementation.
pub struct Store {
    conn: Connection,
    pub config: Config,
}

impl Store {
    /// Opens or creates a storage database at the given path.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Store { conn, config };
        store.run_migrations()?;
        Ok(store)
    }

    /// Creates an in-memory store (for testing).
    pub fn in_memory(config: Config) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn, config };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let migrations = migration::all_migrations();
        migration::MigrationRunner::run(&self.conn, &migrations)
    }

    /// Returns the current schema version.
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        migration::MigrationRunner::current_version(&self.conn)
    }
}

pub(crate) fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
