// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use fieldsync_core::record::Engine;

use crate::common::{Harness, Note};

/// Property 6: N local saves of distinct records produce counters
/// `{k+1, ..., k+N}`, in order, with no duplicates or gaps.
#[test]
fn sequential_local_saves_assign_contiguous_counters() {
    let harness = Harness::new("writer", false);
    let engine = Engine::new(&harness.store);

    let mut counters = Vec::new();
    for i in 0..20 {
        let saved = engine
            .save_local(&harness.own.id, &harness.key, Note::new(&format!("note-{i}")))
            .unwrap();
        counters.push(saved.counter);
    }

    let expected: Vec<u64> = (1..=20).collect();
    assert_eq!(counters, expected);

    let unique: std::collections::HashSet<_> = counters.iter().collect();
    assert_eq!(unique.len(), counters.len(), "counters must not repeat");
}

/// A local save before the own device is bootstrapped reports
/// `UnregisteredDevice` rather than silently assigning counter 0.
#[test]
fn local_save_before_bootstrap_is_rejected() {
    let store = fieldsync_core::storage::Store::in_memory(fieldsync_core::storage::Config::default()).unwrap();
    let engine = Engine::new(&store);
    let result = engine.save_local(
        "00000000000000000000000000000001",
        &fieldsync_core::crypto::SigningKeyPair::from_pkcs8(
            include_bytes!("../../src/crypto/testdata/test_key.pkcs8").to_vec(),
        )
        .unwrap(),
        Note::new("too early"),
    );
    assert!(result.is_err());
}
