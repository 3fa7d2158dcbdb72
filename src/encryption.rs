//! Encryption service — credential payload encryption over the custody store.
//!
//! Every call fetches the master secret fresh from [`CustodyStore`]; there
//! is no service-local caching, so a re-bind (key rotation mid-session) is
//! observed immediately. String output is base64(`nonce || ciphertext`).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto;
use crate::custody::CustodyStore;
use crate::error::{CoreError, Result};

/// A credential record as the rest of the application sees it.
///
/// `password` is independently ciphertext when nested inside a stored
/// blob: the JSON of the whole credential is encrypted, and the field may
/// already hold an encrypted string at that point (double wrapping).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub name: String,
    pub login: String,
    pub password: String,
}

pub struct EncryptionService {
    custody: Arc<CustodyStore>,
}

impl EncryptionService {
    pub fn new(custody: Arc<CustodyStore>) -> Self {
        Self { custody }
    }

    /// Encrypt a string under the current master secret.
    pub async fn encrypt_string(&self, plaintext: &str) -> Result<String> {
        let mut key = self.master_key().await?;
        let ciphertext = crypto::aes_encrypt(&key, plaintext.as_bytes());
        key.zeroize();
        Ok(crypto::to_base64(&ciphertext))
    }

    /// Decrypt a string produced by [`encrypt_string`](Self::encrypt_string).
    /// Never returns partially decoded data.
    pub async fn decrypt_string(&self, data: &str) -> Result<String> {
        let mut key = self.master_key().await?;
        let ciphertext = crypto::from_base64(data)?;
        let plaintext = crypto::aes_decrypt(&key, &ciphertext);
        key.zeroize();
        String::from_utf8(plaintext?)
            .map_err(|_| CoreError::DecryptionFailed("plaintext is not valid UTF-8".into()))
    }

    /// Serialize a credential to canonical JSON and encrypt it.
    pub async fn encrypt_credential(&self, credential: &Credential) -> Result<String> {
        let mut json = serde_json::to_string(credential)?;
        let result = self.encrypt_string(&json).await;
        json.zeroize();
        result
    }

    /// Decrypt and parse a credential blob.
    pub async fn decrypt_credential(&self, data: &str) -> Result<Credential> {
        let mut json = self.decrypt_string(data).await?;
        let credential = serde_json::from_str(&json)
            .map_err(|e| CoreError::DecryptionFailed(format!("malformed credential: {e}")));
        json.zeroize();
        credential
    }

    /// Fresh read against the custody store; the AES key is the SHA-256 of
    /// the bound secret's bytes.
    async fn master_key(&self) -> Result<[u8; crypto::KEY_LEN]> {
        let mut secret = self.custody.read().await?.ok_or(CoreError::NotUnlocked)?;
        let key = crypto::sha256(secret.as_bytes());
        secret.zeroize();
        Ok(key)
    }
}
