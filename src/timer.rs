//! Session countdown timer.
//!
//! Counts down from a fixed budget on one-second ticks, independent of any
//! network activity. Crossing the thresholds changes the urgency level shown
//! to the user but never blocks interaction; at zero the display freezes at
//! "00:00" with the danger urgency pinned. Expiry enforcement, if any, is a
//! backend concern.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::WizardConfig;

/// Visible urgency of the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Warning,
    Danger,
}

/// The countdown state machine. Pure except for [`SessionTimer::spawn`].
#[derive(Debug, Clone)]
pub struct SessionTimer {
    remaining_secs: u32,
    warning_at: u32,
    danger_at: u32,
}

impl SessionTimer {
    pub fn new(config: &WizardConfig) -> Self {
        Self {
            remaining_secs: config.session_budget_secs,
            warning_at: config.warning_threshold_secs,
            danger_at: config.danger_threshold_secs,
        }
    }

    /// Advance one second. Saturates at zero.
    pub fn tick(&mut self) {
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_secs == 0
    }

    /// Current urgency. Once expired this is permanently `Danger`.
    pub fn urgency(&self) -> Urgency {
        if self.remaining_secs <= self.danger_at {
            Urgency::Danger
        } else if self.remaining_secs <= self.warning_at {
            Urgency::Warning
        } else {
            Urgency::Normal
        }
    }

    /// `mm:ss` display string; frozen at "00:00" after expiry.
    pub fn display(&self) -> String {
        let m = self.remaining_secs / 60;
        let s = self.remaining_secs % 60;
        format!("{m:02}:{s:02}")
    }

    fn state(&self) -> TimerState {
        TimerState {
            remaining_secs: self.remaining_secs,
            urgency: self.urgency(),
            display: self.display(),
        }
    }

    /// Start the one-second tick loop, publishing state on a watch channel.
    ///
    /// The loop stops itself at expiry; the returned ticker is aborted early
    /// when the wizard reaches its terminal state.
    pub fn spawn(self) -> SessionTicker {
        let (tx, rx) = watch::channel(self.state());
        let mut timer = self;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // First tick completes immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                timer.tick();
                let expired = timer.is_expired();
                if tx.send(timer.state()).is_err() {
                    break;
                }
                if expired {
                    tracing::debug!("Session timer expired; display frozen at 00:00");
                    break;
                }
            }
        });
        SessionTicker { rx, handle }
    }
}

/// Published countdown state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerState {
    pub remaining_secs: u32,
    pub urgency: Urgency,
    pub display: String,
}

/// Handle to a running countdown.
pub struct SessionTicker {
    rx: watch::Receiver<TimerState>,
    handle: JoinHandle<()>,
}

impl SessionTicker {
    /// Latest published state.
    pub fn state(&self) -> TimerState {
        self.rx.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn watch(&self) -> watch::Receiver<TimerState> {
        self.rx.clone()
    }

    /// Stop ticking (terminal wizard state).
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for SessionTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
