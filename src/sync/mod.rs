// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync Protocol Module
//!
//! The two pieces that make up a sync round between a pair of devices: the
//! session handshake that establishes mutual identity ([`session`]), and the
//! batch selector that decides what to send once a session is active
//! ([`selector`]). [`wire`] carries the `serde` types both speak at their
//! boundary; no transport is implemented here (§1/§6 — HTTP/RPC is a
//! caller's concern).

pub mod selector;
pub mod session;
pub mod wire;

pub use selector::{select_batch, SelectorError};
pub use session::{four_tuple, SessionError, SessionState};
pub use wire::SerializedRecord;
