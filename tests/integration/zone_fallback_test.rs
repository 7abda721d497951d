// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;

use fieldsync_core::record::{Engine, SignedRecord, SyncableRegistry};
use fieldsync_core::sync::select_batch;

use crate::common::{Harness, Note};

/// Property 10: a record signed by a trusted device with `zone_fallback=Z`
/// is selected by a zone-Z peer; the same record with `zone_fallback=Z'` is
/// not.
#[test]
fn zone_fallback_gates_selection_by_target_zone() {
    let authority = Harness::new("authority", true);
    let engine = Engine::new(&authority.store);

    let mut north = Note::new("north note");
    north.zone_fallback = Some("zone-north".to_string());
    engine
        .save_local(&authority.own.id, &authority.key, north)
        .unwrap();

    let mut south = Note::new("south note");
    south.zone_fallback = Some("zone-south".to_string());
    engine
        .save_local(&authority.own.id, &authority.key, south)
        .unwrap();

    let mut registry = SyncableRegistry::new();
    registry.register(Note::model_tag(), false);

    let counters = HashMap::from([(authority.own.id.clone(), 0u64)]);
    let north_batch = select_batch(&authority.store, &registry, "zone-north", Some(counters.clone()), 100).unwrap();
    assert_eq!(north_batch.len(), 1);
    assert_eq!(north_batch[0].fields["body"], "north note");

    let south_batch = select_batch(&authority.store, &registry, "zone-south", Some(counters), 100).unwrap();
    assert_eq!(south_batch.len(), 1);
    assert_eq!(south_batch[0].fields["body"], "south note");
}
