//! Secret custody store — the master secret, encrypted at rest in memory.
//!
//! The plaintext master secret never touches a persistent medium. On
//! `bind`, a fresh random wrapping key encrypts the secret; only the
//! ciphertext stays in process memory, and the wrapping key goes into the
//! OS keychain under `(service = "keybeat", account = login)`. `read`
//! re-assembles the secret on demand; `clear` deletes the keychain entry
//! and wipes the in-memory state.
//!
//! State machine: Unbound → Bound(login) → Unbound, explicit calls only.
//! There is no timeout here; the idle-lock consumer decides when to clear.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use zeroize::Zeroize;

use crate::crypto;
use crate::error::{CoreError, Result};

/// Keychain service name for all wrapping-key entries.
pub const KEYCHAIN_SERVICE: &str = "keybeat";

// ── SecretStore capability ──────────────────────────────────────────

/// Narrow interface over the OS keychain. Platform adapters implement
/// this; core logic never touches a native API directly.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<()>;

    /// `Ok(None)` when no entry exists for `(service, account)`.
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>>;

    /// Deleting a missing entry is a no-op, not an error.
    async fn delete(&self, service: &str, account: &str) -> Result<()>;
}

/// OS keychain adapter backed by the `keyring` crate. The underlying
/// calls are blocking, so each one runs on the blocking pool.
pub struct KeyringStore;

fn keychain_err(e: keyring::Error) -> CoreError {
    CoreError::KeychainUnavailable(e.to_string())
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        let (service, account) = (service.to_owned(), account.to_owned());
        let mut secret = secret.to_owned();
        tokio::task::spawn_blocking(move || {
            let result = keyring::Entry::new(&service, &account)
                .and_then(|entry| entry.set_password(&secret))
                .map_err(keychain_err);
            secret.zeroize();
            result
        })
        .await
        .map_err(|e| CoreError::KeychainUnavailable(e.to_string()))?
    }

    async fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        let (service, account) = (service.to_owned(), account.to_owned());
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &account).map_err(keychain_err)?;
            match entry.get_password() {
                Ok(secret) => Ok(Some(secret)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(keychain_err(e)),
            }
        })
        .await
        .map_err(|e| CoreError::KeychainUnavailable(e.to_string()))?
    }

    async fn delete(&self, service: &str, account: &str) -> Result<()> {
        let (service, account) = (service.to_owned(), account.to_owned());
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &account).map_err(keychain_err)?;
            match entry.delete_password() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(keychain_err(e)),
            }
        })
        .await
        .map_err(|e| CoreError::KeychainUnavailable(e.to_string()))?
    }
}

/// In-memory adapter for tests and headless environments.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: StdMutex<HashMap<(String, String), String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert((service.to_owned(), account.to_owned()), secret.to_owned());
        Ok(())
    }

    async fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(service.to_owned(), account.to_owned()))
            .cloned())
    }

    async fn delete(&self, service: &str, account: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .remove(&(service.to_owned(), account.to_owned()));
        Ok(())
    }
}

// ── Custody store ───────────────────────────────────────────────────

/// Login + ciphertext for the currently bound session.
struct BoundSecret {
    login: String,
    ciphertext: Vec<u8>,
}

impl Drop for BoundSecret {
    fn drop(&mut self) {
        self.ciphertext.zeroize();
    }
}

/// Binds one session to one login and guards the master secret.
pub struct CustodyStore {
    store: Arc<dyn SecretStore>,
    state: RwLock<Option<BoundSecret>>,
}

impl CustodyStore {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            state: RwLock::new(None),
        }
    }

    /// Bind `secret` to `login` for this session.
    ///
    /// Generates a fresh wrapping key every call. A second bind for the
    /// same login overwrites both the in-memory ciphertext and the
    /// keychain entry.
    pub async fn bind(&self, login: &str, secret: &str) -> Result<()> {
        let mut wrap_key = crypto::random_key();
        let ciphertext = crypto::aes_encrypt(&wrap_key, secret.as_bytes());

        let mut key_hex = hex::encode(wrap_key);
        wrap_key.zeroize();

        let stored = self.store.set(KEYCHAIN_SERVICE, login, &key_hex).await;
        key_hex.zeroize();
        stored?;

        *self.state.write().await = Some(BoundSecret {
            login: login.to_owned(),
            ciphertext,
        });
        debug!(login, "master secret bound");
        Ok(())
    }

    /// Read the master secret back.
    ///
    /// `Ok(None)` when never bound or after [`clear`](Self::clear) — the
    /// expected locked state. A missing keychain entry while a login is
    /// bound, or a failed decryption, is surfaced as an error rather than
    /// swallowed: silently returning nothing would corrupt the vault's
    /// integrity guarantees upstream.
    pub async fn read(&self) -> Result<Option<String>> {
        let state = self.state.read().await;
        let Some(bound) = state.as_ref() else {
            return Ok(None);
        };

        let mut key_hex = self
            .store
            .get(KEYCHAIN_SERVICE, &bound.login)
            .await?
            .ok_or(CoreError::CustodyInconsistent)?;

        let decoded: Option<[u8; crypto::KEY_LEN]> = hex::decode(&key_hex)
            .ok()
            .and_then(|bytes| bytes.try_into().ok());
        key_hex.zeroize();
        let mut key =
            decoded.ok_or_else(|| CoreError::DecryptionFailed("malformed wrapping key".into()))?;
        let plaintext = crypto::aes_decrypt(&key, &bound.ciphertext);
        key.zeroize();

        let secret = String::from_utf8(plaintext?)
            .map_err(|_| CoreError::DecryptionFailed("secret is not valid UTF-8".into()))?;
        Ok(Some(secret))
    }

    /// Delete the keychain entry and wipe the bound state.
    /// Safe to call when already unbound.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(bound) = state.take() else {
            return Ok(());
        };
        // Memory is wiped regardless of whether the keychain delete lands.
        let result = self.store.delete(KEYCHAIN_SERVICE, &bound.login).await;
        debug!(login = %bound.login, "master secret cleared");
        result
    }

    pub async fn is_bound(&self) -> bool {
        self.state.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custody() -> (Arc<MemorySecretStore>, CustodyStore) {
        let store = Arc::new(MemorySecretStore::new());
        let custody = CustodyStore::new(Arc::clone(&store) as Arc<dyn SecretStore>);
        (store, custody)
    }

    #[tokio::test]
    async fn test_read_before_bind_is_none() {
        let (_, custody) = custody();
        assert!(custody.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bind_read_clear_lifecycle() {
        let (_, custody) = custody();

        custody.bind("alice", "s3cret").await.unwrap();
        assert_eq!(custody.read().await.unwrap().as_deref(), Some("s3cret"));

        custody.clear().await.unwrap();
        assert!(custody.read().await.unwrap().is_none());
        assert!(!custody.is_bound().await);
    }

    #[tokio::test]
    async fn test_clear_when_unbound_is_noop() {
        let (_, custody) = custody();
        custody.clear().await.unwrap();
        custody.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_rebind_generates_fresh_wrapping_key() {
        let (store, custody) = custody();

        custody.bind("alice", "same-secret").await.unwrap();
        let first_key = store
            .get(KEYCHAIN_SERVICE, "alice")
            .await
            .unwrap()
            .unwrap();

        custody.bind("alice", "same-secret").await.unwrap();
        let second_key = store
            .get(KEYCHAIN_SERVICE, "alice")
            .await
            .unwrap()
            .unwrap();

        assert_ne!(first_key, second_key);
        assert_eq!(
            custody.read().await.unwrap().as_deref(),
            Some("same-secret")
        );
    }

    #[tokio::test]
    async fn test_missing_keychain_entry_is_inconsistent() {
        let (store, custody) = custody();

        custody.bind("alice", "s3cret").await.unwrap();
        store.delete(KEYCHAIN_SERVICE, "alice").await.unwrap();

        let err = custody.read().await.unwrap_err();
        assert!(matches!(err, CoreError::CustodyInconsistent));
    }

    #[tokio::test]
    async fn test_corrupted_wrapping_key_fails_decryption() {
        let (store, custody) = custody();

        custody.bind("alice", "s3cret").await.unwrap();

        // Overwrite the entry with a different (valid-length) key
        let bogus = hex::encode(crypto::random_key());
        store.set(KEYCHAIN_SERVICE, "alice", &bogus).await.unwrap();
        assert!(matches!(
            custody.read().await.unwrap_err(),
            CoreError::DecryptionFailed(_)
        ));

        // And with something that is not hex at all
        store
            .set(KEYCHAIN_SERVICE, "alice", "not-hex")
            .await
            .unwrap();
        assert!(matches!(
            custody.read().await.unwrap_err(),
            CoreError::DecryptionFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_clear_deletes_keychain_entry() {
        let (store, custody) = custody();
        custody.bind("alice", "s3cret").await.unwrap();
        custody.clear().await.unwrap();
        assert!(store
            .get(KEYCHAIN_SERVICE, "alice")
            .await
            .unwrap()
            .is_none());
    }
}
