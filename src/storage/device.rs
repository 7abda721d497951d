// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Device registry storage operations.

use rusqlite::{params, OptionalExtension};

use super::{Store, StorageError};

/// A row from the `devices` table: a device's identity plus its metadata
/// (trust flag, own-device flag, counter high-water mark).
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub public_key: String,
    pub signature: String,
    pub is_trusted: bool,
    pub is_own_device: bool,
    pub counter_position: u64,
}

fn row_to_device(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeviceRow> {
    Ok(DeviceRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        public_key: row.get(3)?,
        signature: row.get(4)?,
        is_trusted: row.get::<_, i64>(5)? != 0,
        is_own_device: row.get::<_, i64>(6)? != 0,
        counter_position: row.get::<_, i64>(7)? as u64,
    })
}

const DEVICE_COLUMNS: &str =
    "id, name, description, public_key, signature, is_trusted, is_own_device, counter_position";

impl Store {
    /// Inserts a new device row. Used both for remote devices learned during
    /// sync and for the two-phase own-device bootstrap, where the row is
    /// inserted before its self-signature is known.
    pub fn insert_device_skeleton(&self, device: &DeviceRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO devices (id, name, description, public_key, signature, is_trusted, is_own_device, counter_position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                device.id,
                device.name,
                device.description,
                device.public_key,
                device.signature,
                device.is_trusted as i64,
                device.is_own_device as i64,
                device.counter_position as i64,
            ],
        )?;
        Ok(())
    }

    /// Stores the PKCS#8 private key material for the own device.
    pub fn save_own_device_key(&self, device_id: &str, pkcs8: &[u8]) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO own_device_key (device_id, pkcs8) VALUES (?1, ?2)",
            params![device_id, pkcs8],
        )?;
        Ok(())
    }

    /// Loads the PKCS#8 private key material for a device, if it is ours.
    pub fn load_own_device_key(&self, device_id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.conn
            .query_row(
                "SELECT pkcs8 FROM own_device_key WHERE device_id = ?1",
                params![device_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)
    }

    /// Completes the own-device bootstrap by writing the computed
    /// self-signature and trust flag back onto the skeleton row.
    pub fn finalize_device_signature(
        &self,
        device_id: &str,
        signature: &str,
        is_trusted: bool,
    ) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE devices SET signature = ?1, is_trusted = ?2 WHERE id = ?3",
            params![signature, is_trusted as i64, device_id],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(format!("device {device_id}")));
        }
        Ok(())
    }

    /// Looks up a device by id.
    pub fn get_device(&self, device_id: &str) -> Result<Option<DeviceRow>, StorageError> {
        self.conn
            .query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1"),
                params![device_id],
                row_to_device,
            )
            .optional()
            .map_err(StorageError::from)
    }

    /// Looks up a device by its serialized public key.
    pub fn get_device_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<DeviceRow>, StorageError> {
        self.conn
            .query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE public_key = ?1"),
                params![public_key],
                row_to_device,
            )
            .optional()
            .map_err(StorageError::from)
    }

    /// Returns this process's own device, if it has been bootstrapped.
    pub fn get_own_device(&self) -> Result<Option<DeviceRow>, StorageError> {
        self.conn
            .query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE is_own_device = 1"),
                [],
                row_to_device,
            )
            .optional()
            .map_err(StorageError::from)
    }

    /// Whether the given device is currently trusted. Returns `false` for an
    /// unknown device.
    pub fn is_device_trusted(&self, device_id: &str) -> Result<bool, StorageError> {
        Ok(self.get_device(device_id)?.map(|d| d.is_trusted).unwrap_or(false))
    }

    /// Returns the serialized public key for a device, if known.
    pub fn get_device_public_key(&self, device_id: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get_device(device_id)?.map(|d| d.public_key))
    }

    /// Returns a device's recorded counter high-water mark, or 0 if unknown.
    pub fn get_device_counter_position(&self, device_id: &str) -> Result<u64, StorageError> {
        Ok(self.get_device(device_id)?.map(|d| d.counter_position).unwrap_or(0))
    }

    /// Atomically increments the own device's counter and returns the new
    /// value. Returns 0 if no own device has been bootstrapped yet.
    pub fn increment_and_get_own_counter(&self) -> Result<u64, StorageError> {
        self.conn.execute(
            "UPDATE devices SET counter_position = counter_position + 1 WHERE is_own_device = 1",
            [],
        )?;
        self.get_own_counter()
    }

    /// Returns the own device's current counter position, or 0 if no own
    /// device has been bootstrapped yet.
    pub fn get_own_counter(&self) -> Result<u64, StorageError> {
        let value: Option<i64> = self
            .conn
            .query_row(
                "SELECT counter_position FROM devices WHERE is_own_device = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.unwrap_or(0) as u64)
    }

    /// Raises a device's recorded counter high-water mark to at least `n`.
    /// Used when importing records so a later local increment never reuses
    /// a counter value seen from a remote peer.
    pub fn set_counter_position(&self, device_id: &str, n: u64) -> Result<(), StorageError> {
        self.conn.execute(
            "UPDATE devices SET counter_position = MAX(counter_position, ?1) WHERE id = ?2",
            params![n as i64, device_id],
        )?;
        Ok(())
    }

    /// Sets a device's trust flag.
    pub fn set_device_trusted(&self, device_id: &str, trusted: bool) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE devices SET is_trusted = ?1 WHERE id = ?2",
            params![trusted as i64, device_id],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(format!("device {device_id}")));
        }
        Ok(())
    }

    /// Lists every known device.
    pub fn list_all_devices(&self) -> Result<Vec<DeviceRow>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DEVICE_COLUMNS} FROM devices"))?;
        let rows = stmt.query_map([], row_to_device)?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
