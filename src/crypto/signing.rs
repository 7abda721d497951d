// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! RSA-PKCS1v1.5-SHA256 Signing
//!
//! Every replicated record signs a canonical byte string (see
//! [`crate::record::canonical`]) under an RSA keypair. The on-wire encoding
//! of both signatures and public keys must stay byte-stable: installations
//! that verified artifacts signed years ago must keep verifying them, so
//! this module never changes the signature scheme or the serialized key
//! format, only adds to it.
//!
//! Key *generation* is out of scope here — callers supply a PKCS#8 document
//! (however it was produced) to [`SigningKeyPair::from_pkcs8`].

use base64::Engine;
use ring::rand::SystemRandom;
use ring::signature::{self, RsaKeyPair};
use thiserror::Error;
use zeroize::Zeroize;

/// Crypto primitive errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid PKCS#8 key document")]
    InvalidKeyDocument,
    #[error("signing failed")]
    SigningFailed,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid public key encoding")]
    InvalidPublicKey,
}

/// A raw signature. PKCS1v1.5-SHA256 signatures over an RSA-2048 key are
/// 256 bytes; larger keys produce larger signatures, so this is a `Vec<u8>`
/// rather than a fixed-size array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Signature(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encodes as line-break-free base64, the wire representation used by
    /// every signed record's `signature` field.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map(Signature)
            .map_err(|_| CryptoError::InvalidBase64)
    }
}

/// An RSA public key, held as its DER `SubjectPublicKeyInfo` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_der(der: Vec<u8>) -> Self {
        PublicKey(der)
    }

    pub fn as_der(&self) -> &[u8] {
        &self.0
    }

    /// Canonical text serialization: base64 of the DER bytes. This is what
    /// `Device.public_key` stores and what travels in serialized records.
    pub fn serialize(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    pub fn deserialize(s: &str) -> Result<Self, CryptoError> {
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map(PublicKey)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Verifies `signature` over `message` under this public key.
    pub fn verify(&self, message: &[u8], sig: &Signature) -> bool {
        signature::UnparsedPublicKey::new(&signature::RSA_PKCS1_2048_8192_SHA256, self.0.as_slice())
            .verify(message, sig.as_bytes())
            .is_ok()
    }
}

/// Holds the private key material needed to sign. Zeroed on drop; its
/// `Debug` impl never prints key bytes.
pub struct SigningKeyPair {
    inner: RsaKeyPair,
    pkcs8: Vec<u8>,
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("pkcs8", &"[REDACTED]")
            .finish()
    }
}

impl Drop for SigningKeyPair {
    fn drop(&mut self) {
        self.pkcs8.zeroize();
    }
}

impl SigningKeyPair {
    /// Loads a keypair from a PKCS#8 document (as produced by, e.g., OpenSSL
    /// or another external generator — this crate never generates RSA keys).
    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Self, CryptoError> {
        let inner =
            RsaKeyPair::from_pkcs8(&pkcs8).map_err(|_| CryptoError::InvalidKeyDocument)?;
        Ok(SigningKeyPair { inner, pkcs8 })
    }

    /// The PKCS#8 document this keypair was loaded from, so the caller can
    /// persist it (e.g. for an own device reloaded across process restarts).
    pub fn as_pkcs8(&self) -> &[u8] {
        &self.pkcs8
    }

    /// The public half of this keypair, as a DER `SubjectPublicKeyInfo`.
    pub fn public_key_der(&self) -> PublicKey {
        PublicKey(self.inner.public().as_ref().to_vec())
    }

    /// Signs `message`, returning the raw PKCS1v1.5-SHA256 signature bytes.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        let rng = SystemRandom::new();
        let mut sig_bytes = vec![0u8; self.inner.public().modulus_len()];
        self.inner
            .sign(
                &signature::RSA_PKCS1_SHA256,
                &rng,
                message,
                &mut sig_bytes,
            )
            .map_err(|_| CryptoError::SigningFailed)?;
        Ok(Signature(sig_bytes))
    }
}

/// Generates 32 random bytes via the system RNG. Used for session nonces
/// and the device bootstrap's ephemeral salt.
pub fn random_bytes_32() -> [u8; 32] {
    use ring::rand::SecureRandom;
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes).expect("system RNG should not fail");
    bytes
}

/// Lowercase hex encoding of 32 random bytes — the session nonce format
/// (`client_nonce`/`server_nonce` are 32 hex chars).
pub fn random_hex_nonce() -> String {
    hex::encode(random_bytes_32())
}
