//! Key derivation pipeline — two-step PBKDF2 chain.
//!
//! From one plaintext password and a per-account salt, two independent keys
//! are derived:
//!
//!   hashed   = SHA256(password)                          (hex)
//!   authKey  = PBKDF2(hashed, salt, 150000 iter, 64 B)   → sent remote
//!   verifier = PBKDF2(authKey, salt, 150000 iter, 64 B)  → stored local
//!
//! The local verifier is one irreversible derivation beyond the auth key,
//! so the on-device verifier store never yields anything usable against the
//! remote system. Both passes consume the hex form of their input, keeping
//! the derived values stable across platforms.
//!
//! The salt is generated once at registration or password reset and fixed
//! per account thereafter.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{random_bytes, sha256_hex};

/// PBKDF2 iteration count for both derivation passes.
pub const PBKDF2_ITERATIONS: u32 = 150_000;

/// Output length of each derivation pass.
pub const DERIVED_KEY_LEN: usize = 64;

/// Per-account salt length.
pub const SALT_LEN: usize = 32;

/// A 64-byte PBKDF2 output. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; DERIVED_KEY_LEN]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.0
    }

    /// Lowercase hex form — the shape that crosses the auth boundary and
    /// feeds the second derivation pass.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// Debug must not leak key material.
impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Generate a fresh per-account salt (registration / password reset only).
pub fn generate_salt() -> Vec<u8> {
    random_bytes(SALT_LEN)
}

/// Step 1: SHA-256 prehash of the plaintext password, lowercase hex.
pub fn hash_password(password: &str) -> String {
    sha256_hex(password.as_bytes())
}

/// Step 2: derive the server-facing authentication key.
pub fn derive_auth_key(hashed_password: &str, salt: &[u8]) -> DerivedKey {
    derive(hashed_password.as_bytes(), salt)
}

/// Step 3: derive the local verifier key from the auth key's hex form.
pub fn derive_local_verifier(auth_key: &DerivedKey, salt: &[u8]) -> DerivedKey {
    let mut auth_hex = auth_key.to_hex();
    let verifier = derive(auth_hex.as_bytes(), salt);
    auth_hex.zeroize();
    verifier
}

/// The full login/registration chain: (auth key, local verifier).
pub fn derive_key_pair(password: &str, salt: &[u8]) -> (DerivedKey, DerivedKey) {
    let mut hashed = hash_password(password);
    let auth = derive_auth_key(&hashed, salt);
    hashed.zeroize();
    let verifier = derive_local_verifier(&auth, salt);
    (auth, verifier)
}

fn derive(input: &[u8], salt: &[u8]) -> DerivedKey {
    let mut out = [0u8; DERIVED_KEY_LEN];
    pbkdf2_hmac::<Sha256>(input, salt, PBKDF2_ITERATIONS, &mut out);
    DerivedKey(out)
}
