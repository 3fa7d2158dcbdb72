//! Activity monitor — the idle-lock state machine.
//!
//! Interaction events refresh a timestamp (sampled at most once per
//! second); a 1 Hz tick compares the elapsed idle time against a fixed
//! 10-minute threshold and broadcasts a [`TimeoutSignal`] once crossed.
//!
//! The signal is level-triggered: while idle persists it re-fires on every
//! tick, exactly like the interval check it replaces. Subscribers that
//! navigate on it must tolerate duplicates.
//!
//! Window and power events short-circuit the timer: focus/show count as a
//! fresh interaction, and hide/suspend/lock/shutdown emit the signal
//! immediately regardless of elapsed time.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::debug;

/// Idle threshold before the lock signal fires.
pub const IDLE_THRESHOLD: Duration = Duration::from_secs(10 * 60);

/// Tick period of the idle check.
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Minimum spacing between timestamp refreshes from raw input events.
const INTERACTION_SAMPLE: Duration = Duration::from_secs(1);

/// Broadcast to subscribers when the session should lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSignal;

/// External window/power transitions fed in by the embedding shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    WindowFocus,
    WindowShow,
    WindowHide,
    Suspend,
    LockScreen,
    Shutdown,
}

struct Shared {
    last_interaction: StdMutex<Instant>,
    last_sample: StdMutex<Option<Instant>>,
    tx: broadcast::Sender<TimeoutSignal>,
}

impl Shared {
    fn refresh(&self) {
        *self.last_interaction.lock().unwrap() = Instant::now();
    }

    fn emit(&self) {
        // Fire-and-forget: no receivers is not an error, and a lagging
        // subscriber never blocks delivery to the others.
        let _ = self.tx.send(TimeoutSignal);
    }
}

/// Idle/interaction state machine producing lock signals.
pub struct ActivityMonitor {
    shared: Arc<Shared>,
    ticker: StdMutex<Option<JoinHandle<()>>>,
}

impl ActivityMonitor {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            shared: Arc::new(Shared {
                last_interaction: StdMutex::new(Instant::now()),
                last_sample: StdMutex::new(None),
                tx,
            }),
            ticker: StdMutex::new(None),
        }
    }

    /// Start (or restart) the idle timer.
    ///
    /// Any previous timer is torn down first, so repeated calls never
    /// accumulate duplicate tickers.
    pub fn start(&self) {
        self.finish();
        self.shared.refresh();

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let mut tick = interval(TICK_PERIOD);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let idle_for = shared.last_interaction.lock().unwrap().elapsed();
                if idle_for >= IDLE_THRESHOLD {
                    shared.emit();
                }
            }
        });

        *self.ticker.lock().unwrap() = Some(handle);
        debug!("activity monitor started");
    }

    /// Stop the idle timer. Subscriptions stay valid; session events are
    /// still delivered.
    pub fn finish(&self) {
        if let Some(handle) = self.ticker.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Report a pointer-move or key-down. Throttled to one timestamp
    /// refresh per second to bound overhead at input-event rates.
    pub fn record_interaction(&self) {
        let now = Instant::now();
        {
            let mut last_sample = self.shared.last_sample.lock().unwrap();
            if let Some(prev) = *last_sample {
                if now.duration_since(prev) < INTERACTION_SAMPLE {
                    return;
                }
            }
            *last_sample = Some(now);
        }
        *self.shared.last_interaction.lock().unwrap() = now;
    }

    /// Feed a window/power transition.
    pub fn handle_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::WindowFocus | SessionEvent::WindowShow => {
                self.shared.refresh();
            }
            SessionEvent::WindowHide
            | SessionEvent::Suspend
            | SessionEvent::LockScreen
            | SessionEvent::Shutdown => {
                debug!(?event, "immediate lock signal");
                self.shared.emit();
            }
        }
    }

    /// Subscribe to lock signals. Dropping the receiver is the
    /// cancellation handle.
    pub fn subscribe(&self) -> broadcast::Receiver<TimeoutSignal> {
        self.shared.tx.subscribe()
    }
}

impl Default for ActivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ActivityMonitor {
    fn drop(&mut self) {
        self.finish();
    }
}
