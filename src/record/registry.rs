// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Registry of syncable record classes.
//!
//! Populated once at startup rather than discovered by load-order magic.
//! The batch selector walks this list to know which `model_tag`s exist and
//! whether each requires a trusted signer.

/// One registered syncable record class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncableClass {
    pub model_tag: &'static str,
    pub requires_trusted_signature: bool,
}

/// The set of record classes this process knows how to sync.
#[derive(Debug, Default)]
pub struct SyncableRegistry {
    classes: Vec<SyncableClass>,
}

impl SyncableRegistry {
    pub fn new() -> Self {
        SyncableRegistry::default()
    }

    /// Registers a record class by its tag and trust requirement. Callers
    /// typically pass `T::model_tag()` and `T::requires_trusted_signature()`
    /// for a [`super::SignedRecord`] implementor.
    pub fn register(&mut self, model_tag: &'static str, requires_trusted_signature: bool) {
        if self.classes.iter().any(|c| c.model_tag == model_tag) {
            return;
        }
        self.classes.push(SyncableClass {
            model_tag,
            requires_trusted_signature,
        });
    }

    pub fn classes(&self) -> &[SyncableClass] {
        &self.classes
    }
}
