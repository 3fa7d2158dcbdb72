// KeyBeat — Top-level error types
//
// One enum for everything that can go wrong at the crate boundary.
// The locked state ("never bound") is not an error: CustodyStore::read
// returns Ok(None) for it, and only the inconsistent or corrupt cases
// surface here.

use thiserror::Error;

/// Top-level error type for all KeyBeat core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Encrypt/decrypt was attempted while no master secret is bound.
    #[error("vault is locked: no master secret bound")]
    NotUnlocked,

    /// A login is bound but its wrapping key is missing from the keychain.
    /// The in-memory ciphertext is unrecoverable; the session must re-bind.
    #[error("custody state inconsistent: wrapping key missing for bound login")]
    CustodyInconsistent,

    /// Ciphertext/key mismatch, or the decrypted bytes were not valid
    /// UTF-8/JSON. Partially decoded data is never returned.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The OS keychain denied access or failed outright.
    #[error("keychain unavailable: {0}")]
    KeychainUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
