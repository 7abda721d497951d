// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync session storage operations.

use rusqlite::{params, OptionalExtension};

use super::{now_unix, Store, StorageError};

/// A row from the `sync_sessions` table: the handshake and accounting state
/// for one client/server sync session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub client_nonce: String,
    pub client_device: String,
    pub server_nonce: String,
    pub server_device: Option<String>,
    pub verified: bool,
    pub models_uploaded: u64,
    pub models_downloaded: u64,
    pub ip: String,
    pub client_version: String,
    pub closed: bool,
    pub last_touched: i64,
}

const SESSION_COLUMNS: &str = "client_nonce, client_device, server_nonce, server_device, verified, \
    models_uploaded, models_downloaded, ip, client_version, closed, last_touched";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        client_nonce: row.get(0)?,
        client_device: row.get(1)?,
        server_nonce: row.get(2)?,
        server_device: row.get(3)?,
        verified: row.get::<_, i64>(4)? != 0,
        models_uploaded: row.get::<_, i64>(5)? as u64,
        models_downloaded: row.get::<_, i64>(6)? as u64,
        ip: row.get(7)?,
        client_version: row.get(8)?,
        closed: row.get::<_, i64>(9)? != 0,
        last_touched: row.get(10)?,
    })
}

impl Store {
    /// Creates the half-session row the server persists after step 2 of the
    /// handshake (client nonce and device known, server nonce just minted).
    pub fn create_session(&self, session: &SessionRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO sync_sessions
                (client_nonce, client_device, server_nonce, server_device, verified,
                 models_uploaded, models_downloaded, ip, client_version, closed, last_touched)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                session.client_nonce,
                session.client_device,
                session.server_nonce,
                session.server_device,
                session.verified as i64,
                session.models_uploaded as i64,
                session.models_downloaded as i64,
                session.ip,
                session.client_version,
                session.closed as i64,
                session.last_touched,
            ],
        )?;
        Ok(())
    }

    /// Looks up a session by its client nonce.
    pub fn get_session(&self, client_nonce: &str) -> Result<Option<SessionRow>, StorageError> {
        self.conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sync_sessions WHERE client_nonce = ?1"),
                params![client_nonce],
                row_to_session,
            )
            .optional()
            .map_err(StorageError::from)
    }

    /// Marks a session verified and bumps its last-touched timestamp.
    pub fn mark_session_verified(&self, client_nonce: &str) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE sync_sessions SET verified = 1, last_touched = ?1 WHERE client_nonce = ?2",
            params![now_unix(), client_nonce],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(format!("session {client_nonce}")));
        }
        Ok(())
    }

    /// Adds to a session's upload/download counters and refreshes its
    /// last-touched timestamp.
    pub fn record_session_activity(
        &self,
        client_nonce: &str,
        uploaded_delta: u64,
        downloaded_delta: u64,
    ) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE sync_sessions
             SET models_uploaded = models_uploaded + ?1,
                 models_downloaded = models_downloaded + ?2,
                 last_touched = ?3
             WHERE client_nonce = ?4",
            params![uploaded_delta as i64, downloaded_delta as i64, now_unix(), client_nonce],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(format!("session {client_nonce}")));
        }
        Ok(())
    }

    /// Closes a session. Its nonce must never be reused afterward.
    pub fn close_session(&self, client_nonce: &str) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE sync_sessions SET closed = 1, last_touched = ?1 WHERE client_nonce = ?2",
            params![now_unix(), client_nonce],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(format!("session {client_nonce}")));
        }
        Ok(())
    }

    /// Removes half-sessions abandoned mid-handshake: never verified, never
    /// closed, and untouched for longer than `timeout_secs`. An active or
    /// cleanly-closed session is left alone regardless of age — only a
    /// stalled handshake is garbage. Returns the number of rows removed.
    /// Intended to run periodically.
    pub fn reap_stale_sessions(&self, timeout_secs: u64) -> Result<usize, StorageError> {
        let cutoff = now_unix() - timeout_secs as i64;
        let removed = self.conn.execute(
            "DELETE FROM sync_sessions WHERE verified = 0 AND closed = 0 AND last_touched < ?1",
            params![cutoff],
        )?;
        Ok(removed)
    }
}
