//! Work/break duration settings.
//!
//! The settings record is one JSON object under [`SETTINGS_KEY`]. Every save
//! goes through validation and is re-published to all subscribers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;
use crate::storage::KvStore;

pub const SETTINGS_KEY: &str = "pomodoro-settings";

pub const DEFAULT_WORK_MINUTES: u32 = 25;
pub const DEFAULT_BREAK_MINUTES: u32 = 5;
pub const MAX_WORK_MINUTES: u32 = 60;
pub const MAX_BREAK_MINUTES: u32 = 30;

/// Configured phase durations in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerConfiguration {
    pub work_duration: u32,
    pub break_duration: u32,
}

impl Default for TimerConfiguration {
    fn default() -> Self {
        Self {
            work_duration: DEFAULT_WORK_MINUTES,
            break_duration: DEFAULT_BREAK_MINUTES,
        }
    }
}

impl TimerConfiguration {
    /// Floor and clamp raw input into the valid ranges.
    pub fn clamped(work: f64, brk: f64) -> Self {
        Self {
            work_duration: clamp_minutes(work, MAX_WORK_MINUTES),
            break_duration: clamp_minutes(brk, MAX_BREAK_MINUTES),
        }
    }

    pub fn work_secs(&self) -> u64 {
        u64::from(self.work_duration) * 60
    }

    pub fn break_secs(&self) -> u64 {
        u64::from(self.break_duration) * 60
    }
}

/// Non-finite input has no nearest bound and lands on the minimum.
fn clamp_minutes(value: f64, max: u32) -> u32 {
    if !value.is_finite() {
        return 1;
    }
    value.floor().clamp(1.0, f64::from(max)) as u32
}

/// Stored records may hold any JSON number; validate on the way in.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    work_duration: f64,
    break_duration: f64,
}

/// Holds the current [`TimerConfiguration`] and publishes changes.
pub struct SettingsStore {
    store: Arc<dyn KvStore>,
    tx: watch::Sender<TimerConfiguration>,
}

impl SettingsStore {
    /// Starts at the defaults; call [`load`](Self::load) to pick up the
    /// persisted record.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let (tx, _rx) = watch::channel(TimerConfiguration::default());
        Self { store, tx }
    }

    /// Read the persisted record. A missing record keeps the current value;
    /// an unreadable one falls back to the defaults.
    pub fn load(&self) {
        let raw = match self.store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("could not read settings: {e}");
                self.tx.send_replace(TimerConfiguration::default());
                return;
            }
        };

        let config = match serde_json::from_str::<StoredSettings>(&raw) {
            Ok(s) => TimerConfiguration::clamped(s.work_duration, s.break_duration),
            Err(e) => {
                tracing::warn!("error parsing settings, using defaults: {e}");
                TimerConfiguration::default()
            }
        };
        self.tx.send_replace(config);
    }

    pub fn current(&self) -> TimerConfiguration {
        *self.tx.borrow()
    }

    /// Subscribe to duration changes. The current value is visible
    /// immediately through [`watch::Receiver::borrow`].
    pub fn durations(&self) -> watch::Receiver<TimerConfiguration> {
        self.tx.subscribe()
    }

    /// Validate, persist, then publish.
    ///
    /// # Errors
    /// Returns an error if the record cannot be written; subscribers are not
    /// notified in that case.
    pub fn save(&self, config: TimerConfiguration) -> Result<TimerConfiguration> {
        self.save_raw(
            f64::from(config.work_duration),
            f64::from(config.break_duration),
        )
    }

    /// Like [`save`](Self::save) but accepts unvalidated input, e.g. a
    /// negative number typed by a user.
    pub fn save_raw(&self, work: f64, brk: f64) -> Result<TimerConfiguration> {
        let validated = TimerConfiguration::clamped(work, brk);
        self.store
            .set(SETTINGS_KEY, &serde_json::to_string(&validated)?)?;
        tracing::debug!(
            work = validated.work_duration,
            brk = validated.break_duration,
            "settings saved"
        );
        self.tx.send_replace(validated);
        Ok(validated)
    }
}
