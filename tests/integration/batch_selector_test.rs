// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;

use fieldsync_core::purgatory::{self, ImportRegistry};
use fieldsync_core::record::{Engine, SignedRecord, SyncableRegistry};
use fieldsync_core::sync::select_batch;

use crate::common::{Harness, Note};

/// Device A signs 12 records; the batch selector hands them to device B a
/// few at a time, and B's purgatory-backed import absorbs every one with no
/// duplicates, advancing its recorded counter for A as it goes.
#[test]
fn selector_and_purgatory_drive_a_full_sync_round() {
    let a = Harness::new("device-a", true);
    let b = Harness::new_peer("device-b", false);
    b.admit(&a);
    b.store.set_device_trusted(&a.own.id, true).unwrap();

    let engine_a = Engine::new(&a.store);
    for i in 0..12 {
        engine_a
            .save_local(&a.own.id, &a.key, Note::new(&format!("note-{i}")))
            .unwrap();
    }
    a.store.set_device_zone(&a.own.id, "zone-1").unwrap();

    let mut registry = SyncableRegistry::new();
    registry.register(Note::model_tag(), false);
    let mut importers = ImportRegistry::new();
    importers.register::<Note>();

    let mut known_counter = 0u64;
    let mut total_saved = 0usize;
    for _ in 0..3 {
        let counters = HashMap::from([(a.own.id.clone(), known_counter)]);
        let batch = select_batch(&a.store, &registry, "zone-1", Some(counters), 5).unwrap();
        if batch.is_empty() {
            break;
        }
        for record in &batch {
            if let Some(counter) = record.fields.get("counter").and_then(|v| v.as_u64()) {
                known_counter = known_counter.max(counter);
            }
        }
        let report = purgatory::ingest(&b.store, &importers, batch).unwrap();
        assert_eq!(report.unsaved_model_count, 0, "every record signed by a trusted known device should import cleanly");
        total_saved += report.saved_model_count;
    }

    assert_eq!(total_saved, 12);
    assert!(b.store.list_purgatory_oldest_first().unwrap().is_empty());

    // Re-driving the same final window is idempotent: re-importing an
    // already-saved record overwrites it in place, no error, no duplicate
    // row (the generic envelope table is keyed by (model_tag, id)).
    let counters = HashMap::from([(a.own.id.clone(), known_counter.saturating_sub(1))]);
    let replay_batch = select_batch(&a.store, &registry, "zone-1", Some(counters), 5).unwrap();
    let replay_report = purgatory::ingest(&b.store, &importers, replay_batch).unwrap();
    assert_eq!(replay_report.unsaved_model_count, 0);
}
