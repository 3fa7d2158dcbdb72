//! IPC bridge — typed commands across the process boundary.
//!
//! Three one-way, at-most-once, unacknowledged commands. The wire format
//! is one JSON frame per line, tagged by channel name, over a Unix domain
//! socket; the command set is transport-agnostic, so any inter-process
//! mechanism can carry [`Command`] values to [`CommandReceiver::dispatch`].
//!
//! No retries, no delivery confirmation: the sender connects, writes one
//! line, and hangs up. Callers must not assume success.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::autotype::{AutoTypeEngine, AutotypeMode, Clipboard};
use crate::crypto;
use crate::error::Result;

pub const CHANNEL_CLEAR_CLIPBOARD: &str = "communicationClearClipboard";
pub const CHANNEL_AUTOTYPE_PASSWORD: &str = "communicationAutotypePassword";
pub const CHANNEL_AUTOTYPE_TYPE: &str = "communicationAutotypeType";

/// The cross-process command set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload")]
pub enum Command {
    /// Wipe the clipboard, but only if its current contents still hash to
    /// `hash`. A clipboard write that happened after the command was
    /// issued is left untouched.
    #[serde(rename = "communicationClearClipboard")]
    ClearClipboard { hash: String },

    /// Store the payload as the pending autotype secret.
    #[serde(rename = "communicationAutotypePassword")]
    SetAutotypeSecret { password: String },

    /// Store the payload as the pending autotype mode.
    #[serde(rename = "communicationAutotypeType")]
    SetAutotypeMode {
        #[serde(rename = "type")]
        mode: AutotypeMode,
    },
}

/// Wipe the clipboard only when its contents still hash to `hash`.
pub fn clear_clipboard_if_matches(clipboard: &dyn Clipboard, hash: &str) {
    let mut current = clipboard.read();
    if crypto::sha256_hex(current.as_bytes()) == hash {
        clipboard.clear();
        debug!("clipboard cleared");
    } else {
        debug!("clipboard contents changed since command was issued; left untouched");
    }
    current.zeroize();
}

// ── Sender ──────────────────────────────────────────────────────────

/// Fire-and-forget command sender: one connection per command.
pub struct CommandSender {
    socket_path: PathBuf,
}

impl CommandSender {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Send a single command. Errors are reported but never retried.
    pub async fn send(&self, command: &Command) -> Result<()> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        let mut frame = serde_json::to_string(command)?;
        frame.push('\n');
        let written = stream.write_all(frame.as_bytes()).await;
        frame.zeroize();
        written?;
        stream.shutdown().await?;
        Ok(())
    }
}

// ── Receiver ────────────────────────────────────────────────────────

/// Receiver side of the bridge: owns the shared autotype engine and the
/// clipboard, and applies incoming commands to them. The global-hotkey
/// callback of the embedding shell calls
/// [`AutoTypeEngine::auto_type`] on the same engine.
pub struct CommandReceiver {
    socket_path: PathBuf,
    engine: Arc<AutoTypeEngine>,
    clipboard: Arc<dyn Clipboard>,
}

impl CommandReceiver {
    pub fn new(
        socket_path: impl Into<PathBuf>,
        engine: Arc<AutoTypeEngine>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            engine,
            clipboard,
        }
    }

    /// Apply one command. Transport-independent, so alternative carriers
    /// can feed commands here directly.
    pub fn dispatch(&self, command: Command) {
        match command {
            Command::ClearClipboard { hash } => {
                clear_clipboard_if_matches(self.clipboard.as_ref(), &hash);
            }
            Command::SetAutotypeSecret { mut password } => {
                self.engine.set_secret(&password);
                password.zeroize();
            }
            Command::SetAutotypeMode { mode } => {
                self.engine.set_mode(mode);
            }
        }
    }

    /// Accept loop. Runs until the task is cancelled.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        // Owner-only: commands carry secrets
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(socket = %self.socket_path.display(), "command receiver listening");

        loop {
            let (stream, _addr) = listener.accept().await?;
            let receiver = Arc::clone(&self);
            tokio::spawn(async move {
                receiver.handle_connection(stream).await;
            });
        }
    }

    async fn handle_connection(&self, stream: UnixStream) {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(mut line)) = lines.next_line().await {
            match serde_json::from_str::<Command>(&line) {
                Ok(command) => self.dispatch(command),
                // Unacknowledged protocol: log and move on
                Err(e) => warn!("dropping malformed command frame: {e}"),
            }
            line.zeroize();
        }
    }
}
