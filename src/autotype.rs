//! AutoType engine — covert credential injection via synthetic input.
//!
//! Holds at most one pending secret + mode, consumed exactly once by the
//! global-hotkey trigger. Two injection paths:
//!
//! - **Normal**: the full secret as synthetic keystrokes.
//! - **TwoChannel**: anti-keylogger split. The outer thirds are pasted
//!   from the clipboard, the caret walks back over the last third, and
//!   the middle third is typed directly. A clipboard-only observer sees
//!   `first + third`; a keystroke-only observer sees only `second`;
//!   neither alone reconstructs the secret.
//!
//! The engine applies no exposure timeout to the pending job; bounding
//! how long a secret may sit here is the setter's contract.

use std::sync::{Arc, Mutex as StdMutex};

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::debug;
use zeroize::Zeroize;

/// Delay before injection, letting window-manager focus land on the
/// target application after the hotkey.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Below this length the split has no meaningful middle fragment.
const TWO_CHANNEL_MIN_LEN: usize = 4;

/// Synthetic input capability. Implemented by a platform adapter in the
/// embedding shell; mocked in tests.
pub trait InputInjector: Send + Sync {
    fn type_string(&self, text: &str);
    fn key_tap(&self, key: &str, modifier: Option<&str>);
}

/// System clipboard capability.
pub trait Clipboard: Send + Sync {
    fn write(&self, text: &str);
    fn read(&self) -> String;
    fn clear(&self);
}

/// Injection mode for the pending secret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutotypeMode {
    #[default]
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "twoChannel")]
    TwoChannel,
}

#[derive(Default)]
struct PendingJob {
    secret: String,
    mode: AutotypeMode,
}

/// At most one pending secret at a time; empty immediately after use.
pub struct AutoTypeEngine {
    injector: Arc<dyn InputInjector>,
    clipboard: Arc<dyn Clipboard>,
    pending: StdMutex<PendingJob>,
}

impl AutoTypeEngine {
    pub fn new(injector: Arc<dyn InputInjector>, clipboard: Arc<dyn Clipboard>) -> Self {
        Self {
            injector,
            clipboard,
            pending: StdMutex::new(PendingJob::default()),
        }
    }

    /// Replace the pending secret.
    pub fn set_secret(&self, secret: &str) {
        let mut pending = self.pending.lock().unwrap();
        pending.secret.zeroize();
        pending.secret = secret.to_owned();
    }

    /// Replace the pending mode.
    pub fn set_mode(&self, mode: AutotypeMode) {
        self.pending.lock().unwrap().mode = mode;
    }

    /// Whether a secret is currently armed for injection.
    pub fn has_pending_secret(&self) -> bool {
        !self.pending.lock().unwrap().secret.is_empty()
    }

    /// Wipe the pending secret without typing it.
    pub fn clear_secret(&self) {
        let mut pending = self.pending.lock().unwrap();
        pending.secret.zeroize();
        pending.secret = String::new();
    }

    /// Hotkey entry point. No-op when no secret is pending.
    ///
    /// The secret is taken out of the job before the settle delay, so the
    /// job is observably empty from the moment consumption starts and the
    /// secret cannot be injected twice.
    pub async fn auto_type(&self) {
        let (mut secret, mode) = {
            let mut pending = self.pending.lock().unwrap();
            let secret = std::mem::take(&mut pending.secret);
            (secret, pending.mode)
        };
        if secret.is_empty() {
            return;
        }

        sleep(SETTLE_DELAY).await;

        match mode {
            AutotypeMode::Normal => self.normal(&secret),
            AutotypeMode::TwoChannel => self.two_channel(&secret),
        }
        debug!(?mode, "autotype injection complete");
        secret.zeroize();
    }

    fn normal(&self, secret: &str) {
        self.injector.type_string(secret);
    }

    fn two_channel(&self, secret: &str) {
        let Some(split) = TwoChannelSplit::of(secret) else {
            // Too short for a meaningful middle fragment
            self.normal(secret);
            return;
        };

        let mut outer = format!("{}{}", split.first, split.third);
        self.clipboard.write(&outer);
        self.injector.key_tap("v", Some("control"));
        for _ in 0..split.third.chars().count() {
            self.injector.key_tap("left", None);
        }
        self.injector.type_string(&split.second);
        outer.zeroize();
    }
}

/// The three fragments of a two-channel injection, in original order.
/// `third` absorbs the remainder when the length is not divisible by 3.
struct TwoChannelSplit {
    first: String,
    second: String,
    third: String,
}

impl Drop for TwoChannelSplit {
    fn drop(&mut self) {
        self.first.zeroize();
        self.second.zeroize();
        self.third.zeroize();
    }
}

impl TwoChannelSplit {
    /// `None` when the secret is too short to split.
    fn of(secret: &str) -> Option<Self> {
        let chars: Vec<char> = secret.chars().collect();
        let len = chars.len();
        if len < TWO_CHANNEL_MIN_LEN {
            return None;
        }
        let n = len / 3;
        Some(Self {
            first: chars[..n].iter().collect(),
            second: chars[n..2 * n].iter().collect(),
            third: chars[2 * n..].iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every injector call in order.
    #[derive(Default)]
    struct RecordingInjector {
        events: Mutex<Vec<String>>,
    }

    impl RecordingInjector {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        /// What a keystroke-only observer would capture.
        fn typed_text(&self) -> String {
            self.events()
                .iter()
                .filter_map(|e| e.strip_prefix("type:").map(str::to_owned))
                .collect()
        }
    }

    impl InputInjector for RecordingInjector {
        fn type_string(&self, text: &str) {
            self.events.lock().unwrap().push(format!("type:{text}"));
        }
        fn key_tap(&self, key: &str, modifier: Option<&str>) {
            let rendered = match modifier {
                Some(m) => format!("tap:{m}+{key}"),
                None => format!("tap:{key}"),
            };
            self.events.lock().unwrap().push(rendered);
        }
    }

    #[derive(Default)]
    struct FakeClipboard {
        contents: Mutex<String>,
    }

    impl Clipboard for FakeClipboard {
        fn write(&self, text: &str) {
            *self.contents.lock().unwrap() = text.to_owned();
        }
        fn read(&self) -> String {
            self.contents.lock().unwrap().clone()
        }
        fn clear(&self) {
            self.contents.lock().unwrap().clear();
        }
    }

    fn engine() -> (Arc<RecordingInjector>, Arc<FakeClipboard>, AutoTypeEngine) {
        let injector = Arc::new(RecordingInjector::default());
        let clipboard = Arc::new(FakeClipboard::default());
        let engine = AutoTypeEngine::new(
            Arc::clone(&injector) as Arc<dyn InputInjector>,
            Arc::clone(&clipboard) as Arc<dyn Clipboard>,
        );
        (injector, clipboard, engine)
    }

    /// Reconstruct the target-field text from the recorded event stream:
    /// paste inserts the clipboard, `left` moves the caret, typing inserts
    /// at the caret.
    fn final_field_text(events: &[String], clipboard: &str) -> String {
        let mut field: Vec<char> = Vec::new();
        let mut caret = 0usize;
        for event in events {
            if event == "tap:control+v" {
                for c in clipboard.chars() {
                    field.insert(caret, c);
                    caret += 1;
                }
            } else if event == "tap:left" {
                caret = caret.saturating_sub(1);
            } else if let Some(text) = event.strip_prefix("type:") {
                for c in text.chars() {
                    field.insert(caret, c);
                    caret += 1;
                }
            }
        }
        field.into_iter().collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_secret_is_noop() {
        let (injector, _, engine) = engine();
        engine.auto_type().await;
        assert!(injector.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_normal_types_whole_secret_once() {
        let (injector, _, engine) = engine();
        engine.set_secret("hunter2");
        engine.auto_type().await;
        assert_eq!(injector.events(), vec!["type:hunter2"]);

        // Consumed exactly once
        engine.auto_type().await;
        assert_eq!(injector.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_channel_reconstructs_secret() {
        for secret in [
            "correct horse battery staple",
            "p@ssw0rd!",
            "exactly12chr",
            "ünïcode-秘密のパス",
        ] {
            let (injector, clipboard, engine) = engine();
            engine.set_secret(secret);
            engine.set_mode(AutotypeMode::TwoChannel);
            engine.auto_type().await;

            assert_eq!(final_field_text(&injector.events(), &clipboard.read()), secret);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_channel_neither_channel_sees_whole_secret() {
        let (injector, clipboard, engine) = engine();
        let secret = "correct horse battery staple";
        engine.set_secret(secret);
        engine.set_mode(AutotypeMode::TwoChannel);
        engine.auto_type().await;

        let pasted = clipboard.read();
        let typed = injector.typed_text();
        assert_ne!(pasted, secret);
        assert_ne!(typed, secret);
        assert!(!pasted.is_empty() && !typed.is_empty());
        // The two observers see disjoint fragments that sum to the secret
        assert_eq!(pasted.chars().count() + typed.chars().count(), secret.chars().count());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_channel_boundary_lengths() {
        // L = 4 and 5: one-character middle fragment, split still happens
        for secret in ["abcd", "abcde"] {
            let (injector, clipboard, engine) = engine();
            engine.set_secret(secret);
            engine.set_mode(AutotypeMode::TwoChannel);
            engine.auto_type().await;

            assert_eq!(injector.typed_text().chars().count(), 1);
            assert_eq!(final_field_text(&injector.events(), &clipboard.read()), secret);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_channel_short_secret_falls_back_to_normal() {
        let (injector, clipboard, engine) = engine();
        engine.set_secret("abc");
        engine.set_mode(AutotypeMode::TwoChannel);
        engine.auto_type().await;

        assert_eq!(injector.events(), vec!["type:abc"]);
        assert!(clipboard.read().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_secret_wiped_after_use() {
        let (_, _, engine) = engine();
        engine.set_secret("hunter2");
        engine.auto_type().await;
        assert!(engine.pending.lock().unwrap().secret.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_secret_replaces_previous() {
        let (injector, _, engine) = engine();
        engine.set_secret("old");
        engine.set_secret("new");
        engine.auto_type().await;
        assert_eq!(injector.events(), vec!["type:new"]);
    }

    #[test]
    fn test_split_fragments_concatenate_in_order() {
        let secret = "abcdefghijk"; // 11 chars, n = 3, third absorbs 5
        let split = TwoChannelSplit::of(secret).unwrap();
        assert_eq!(split.first, "abc");
        assert_eq!(split.second, "def");
        assert_eq!(split.third, "ghijk");
        assert_eq!(format!("{}{}{}", split.first, split.second, split.third), secret);
    }

    #[test]
    fn test_split_rejects_short_secrets() {
        assert!(TwoChannelSplit::of("").is_none());
        assert!(TwoChannelSplit::of("abc").is_none());
        assert!(TwoChannelSplit::of("abcd").is_some());
    }

    #[test]
    fn test_mode_wire_values() {
        assert_eq!(serde_json::to_string(&AutotypeMode::Normal).unwrap(), "\"normal\"");
        assert_eq!(
            serde_json::to_string(&AutotypeMode::TwoChannel).unwrap(),
            "\"twoChannel\""
        );
    }
}
