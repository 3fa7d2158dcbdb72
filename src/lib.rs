//! KeyBeat core — local secret custody and credential protection.
//!
//! Derives and guards the key that protects stored credentials, encrypts
//! and decrypts credential payloads on demand, forces a lock on user
//! inactivity, and injects decrypted secrets into the foreground
//! application without exposing them to simple clipboard or keylogger
//! capture.
//!
//! Security:
//! - Master secret encrypted at rest in memory (AES-256-GCM)
//! - Wrapping key lives only in the OS keychain, fresh per bind
//! - Every encrypt/decrypt re-reads the secret; key rotation is immediate
//! - Two-step PBKDF2 chain keeps the local verifier one irreversible
//!   derivation beyond the server-facing auth key
//! - Two-channel autotype splits secrets across clipboard and keystroke
//!   channels so neither observer alone reconstructs them
//! - Key material and pending secrets are zeroized after use
//!
//! UI, persistence, and the remote sync protocol are external
//! collaborators; this crate only provides the primitives they consume.

pub mod activity;
pub mod autotype;
pub mod crypto;
pub mod custody;
pub mod encryption;
pub mod error;
pub mod ipc;
pub mod network;

pub use activity::{ActivityMonitor, SessionEvent, TimeoutSignal};
pub use autotype::{AutoTypeEngine, AutotypeMode, Clipboard, InputInjector};
pub use custody::{CustodyStore, KeyringStore, MemorySecretStore, SecretStore};
pub use encryption::{Credential, EncryptionService};
pub use error::{CoreError, Result};
pub use ipc::{Command, CommandReceiver, CommandSender};
pub use network::{NetworkGate, NetworkMode};

use std::sync::Arc;

/// The service registry, constructed once at startup and passed by handle
/// into consumers. Replaces process-wide singletons: single-instance
/// semantics without hidden global mutable state.
pub struct CoreServices {
    pub custody: Arc<CustodyStore>,
    pub encryption: Arc<EncryptionService>,
    pub activity: Arc<ActivityMonitor>,
    pub autotype: Arc<AutoTypeEngine>,
    pub network: Arc<NetworkGate>,
}

impl CoreServices {
    /// Wire the core together from the platform capabilities the
    /// embedding shell provides.
    pub fn new(
        secret_store: Arc<dyn SecretStore>,
        injector: Arc<dyn InputInjector>,
        clipboard: Arc<dyn Clipboard>,
        initially_connected: bool,
    ) -> Self {
        let custody = Arc::new(CustodyStore::new(secret_store));
        let encryption = Arc::new(EncryptionService::new(Arc::clone(&custody)));
        let autotype = Arc::new(AutoTypeEngine::new(injector, clipboard));
        Self {
            custody,
            encryption,
            activity: Arc::new(ActivityMonitor::new()),
            autotype,
            network: Arc::new(NetworkGate::new(initially_connected)),
        }
    }
}
