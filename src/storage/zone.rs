// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Zone membership and pre-authorized public key storage operations.

use rusqlite::{params, OptionalExtension};

use super::{Store, StorageError};

impl Store {
    /// Assigns (or reassigns) the zone a device belongs to.
    pub fn set_device_zone(&self, device_id: &str, zone_id: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO device_zones (device_id, zone_id) VALUES (?1, ?2)",
            params![device_id, zone_id],
        )?;
        Ok(())
    }

    /// Returns the zone a device belongs to, if any.
    pub fn get_device_zone(&self, device_id: &str) -> Result<Option<String>, StorageError> {
        self.conn
            .query_row(
                "SELECT zone_id FROM device_zones WHERE device_id = ?1",
                params![device_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)
    }

    /// Registers a pre-authorized public key, so that a device presenting it
    /// during sync is auto-admitted into the given zone without a manual
    /// trust decision.
    pub fn register_device_public_key(
        &self,
        public_key: &str,
        zone_id: &str,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO registered_device_public_keys (public_key, zone_id) VALUES (?1, ?2)",
            params![public_key, zone_id],
        )?;
        Ok(())
    }

    /// Looks up the zone a public key was pre-registered for, without
    /// consuming the registration.
    pub fn lookup_registered_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<String>, StorageError> {
        self.conn
            .query_row(
                "SELECT zone_id FROM registered_device_public_keys WHERE public_key = ?1",
                params![public_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)
    }

    /// Consumes a pre-registered public key, returning its zone if it was
    /// registered. A registration is single-use: once a device has bound to
    /// it, the entry is removed so a different device can't claim it later.
    pub fn consume_registered_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<String>, StorageError> {
        let zone_id = self.lookup_registered_public_key(public_key)?;
        if zone_id.is_some() {
            self.conn.execute(
                "DELETE FROM registered_device_public_keys WHERE public_key = ?1",
                params![public_key],
            )?;
        }
        Ok(zone_id)
    }

    /// Every device directly assigned to `zone_id`.
    pub fn list_devices_in_zone(&self, zone_id: &str) -> Result<Vec<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT device_id FROM device_zones WHERE zone_id = ?1")?;
        let rows = stmt
            .query_map(params![zone_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Trusted devices that have signed at least one record whose
    /// `zone_fallback` is `zone_id`, even though the device itself is not
    /// (necessarily) assigned to that zone. Used to seed the batch selector
    /// with trusted-authority contributors to a zone (§4.5 step 1).
    pub fn list_trusted_devices_with_fallback_to_zone(
        &self,
        zone_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT signed_by FROM signed_records
             WHERE zone_fallback = ?1
               AND signed_by IN (SELECT id FROM devices WHERE is_trusted = 1)",
        )?;
        let rows = stmt
            .query_map(params![zone_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
