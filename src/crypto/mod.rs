// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Cryptographic Primitives
//!
//! RSA-PKCS1v1.5-SHA256 signing/verification, plus the base64/hex codecs and
//! random-byte generation shared by the rest of the crate.

pub mod signing;

pub use signing::{random_bytes_32, random_hex_nonce, CryptoError, PublicKey, Signature, SigningKeyPair};
