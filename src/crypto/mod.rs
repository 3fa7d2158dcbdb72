//! Crypto primitives — hashing, AES-256-GCM, secure random generation.
//!
//! Everything here is keyed by raw 256-bit keys; key *derivation* lives in
//! [`kdf`]. Ciphertext layout is `nonce (12) || ciphertext+tag`, with a
//! fresh random nonce per encryption. Key material passed in by callers is
//! never copied beyond the cipher construction.

pub mod kdf;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

/// Symmetric key length (AES-256).
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length.
const NONCE_LEN: usize = 12;

/// Fill a fresh buffer with cryptographically random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generate a fresh 256-bit symmetric key.
pub fn random_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

/// SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 digest, lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Encrypt with AES-256-GCM. Returns `nonce || ciphertext`.
pub fn aes_encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Vec<u8> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).expect("key length");
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .expect("AES-GCM encryption failed");

    let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    result
}

/// Decrypt ciphertext produced by [`aes_encrypt`].
pub fn aes_decrypt(key: &[u8; KEY_LEN], data: &[u8]) -> Result<Vec<u8>> {
    // 16-byte GCM tag; an empty plaintext still carries nonce + tag
    if data.len() < NONCE_LEN + 16 {
        return Err(CoreError::DecryptionFailed("ciphertext too short".into()));
    }

    let nonce_bytes = &data[..NONCE_LEN];
    let ciphertext = &data[NONCE_LEN..];

    let cipher = Aes256Gcm::new_from_slice(key).expect("key length");
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CoreError::DecryptionFailed("wrong key or corrupted ciphertext".into()))
}

/// Standard base64 encode.
pub fn to_base64(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Standard base64 decode.
pub fn from_base64(data: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(data)
        .map_err(|e| CoreError::DecryptionFailed(format!("invalid base64: {e}")))
}
