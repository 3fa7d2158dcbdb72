//! Network mode gate — connectivity and online-auth state.
//!
//! Process-wide snapshot of `{ connected, authenticated_online }`, mutated
//! by OS connectivity transitions and by explicit login/logout calls, with
//! a broadcast stream of changes. Consumers pick between
//! remote-authoritative writes and local queuing off this state; the
//! queuing/sync algorithm itself lives elsewhere.

use std::sync::RwLock as StdRwLock;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Snapshot of the current network mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkMode {
    pub connected: bool,
    pub authenticated_online: bool,
}

pub struct NetworkGate {
    mode: StdRwLock<NetworkMode>,
    tx: broadcast::Sender<NetworkMode>,
}

impl NetworkGate {
    pub fn new(initially_connected: bool) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            mode: StdRwLock::new(NetworkMode {
                connected: initially_connected,
                authenticated_online: false,
            }),
            tx,
        }
    }

    /// Synchronous snapshot of the current mode.
    pub fn check_status(&self) -> NetworkMode {
        *self.mode.read().unwrap()
    }

    /// OS-level connectivity transition.
    pub fn set_connected(&self, connected: bool) {
        self.update(|mode| mode.connected = connected);
    }

    /// Explicit login/logout transition from the auth flow.
    pub fn set_user_status(&self, authenticated_online: bool) {
        self.update(|mode| mode.authenticated_online = authenticated_online);
    }

    /// Subscribe to mode changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkMode> {
        self.tx.subscribe()
    }

    fn update(&self, apply: impl FnOnce(&mut NetworkMode)) {
        let mut mode = self.mode.write().unwrap();
        let previous = *mode;
        apply(&mut mode);
        if *mode != previous {
            debug!(connected = mode.connected, online = mode.authenticated_online, "network mode changed");
            let _ = self.tx.send(*mode);
        }
    }
}
