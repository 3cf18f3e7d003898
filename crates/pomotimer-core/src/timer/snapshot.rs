//! Suspend/resume snapshots.
//!
//! A snapshot records what the display showed and when. Restoring a running
//! timer subtracts the wall-clock time that passed since then, so it keeps
//! counting while the process is gone. A stopped timer comes back showing
//! exactly what it showed.

use serde::{Deserialize, Serialize};

use super::state::{Phase, TimerState};
use crate::error::CoreError;
use crate::settings::MAX_WORK_MINUTES;
use crate::storage::KvStore;

pub const SNAPSHOT_KEY: &str = "pomodoro-timer-state";

/// No phase can be configured longer than this.
const MAX_STORED_SECS: u64 = MAX_WORK_MINUTES as u64 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub is_break: bool,
    pub is_active: bool,
    pub minutes: String,
    pub seconds: String,
    /// Epoch milliseconds at capture.
    pub timestamp: u64,
}

/// How the timer should come back after a snapshot is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restore {
    /// No usable snapshot.
    Fresh,
    /// Stopped timer; show what was left.
    Idle { phase: Phase, remaining_secs: u64 },
    /// Keep running with what is left.
    Resume { phase: Phase, remaining_secs: u64 },
    BreakFinished,
    /// A work session ran out while suspended; go straight into the break.
    WorkElapsed,
}

impl PersistedSnapshot {
    pub fn capture(state: &TimerState, now_ms: u64) -> Self {
        Self {
            is_break: state.is_break,
            is_active: state.running,
            minutes: state.minutes.clone(),
            seconds: state.seconds.clone(),
            timestamp: now_ms,
        }
    }

    /// The stored display in seconds, or `None` if it is not something the
    /// timer could have shown.
    fn stored_secs(&self) -> Option<u64> {
        let minutes: u64 = self.minutes.trim().parse().ok()?;
        let seconds: u64 = self.seconds.trim().parse().ok()?;
        if seconds >= 60 {
            return None;
        }
        minutes
            .checked_mul(60)?
            .checked_add(seconds)
            .filter(|&total| total <= MAX_STORED_SECS)
    }

    pub fn plan(&self, now_ms: u64) -> Restore {
        let Some(stored) = self.stored_secs() else {
            tracing::warn!(
                minutes = %self.minutes,
                seconds = %self.seconds,
                "snapshot display out of range, starting fresh"
            );
            return Restore::Fresh;
        };
        let phase = if self.is_break {
            Phase::Break
        } else {
            Phase::Work
        };

        if !self.is_active {
            return match (phase, stored) {
                (Phase::Break, 0) => Restore::BreakFinished,
                (phase, remaining_secs) => Restore::Idle {
                    phase,
                    remaining_secs,
                },
            };
        }

        let elapsed_secs = now_ms.saturating_sub(self.timestamp) / 1000;
        let remaining_secs = stored.saturating_sub(elapsed_secs);
        match (phase, remaining_secs) {
            (Phase::Break, 0) => Restore::BreakFinished,
            (Phase::Work, 0) => Restore::WorkElapsed,
            (phase, remaining_secs) => Restore::Resume {
                phase,
                remaining_secs,
            },
        }
    }
}

/// Read the snapshot, treating anything unreadable as absent.
pub fn load_snapshot(store: &dyn KvStore) -> Option<PersistedSnapshot> {
    let raw = match store.get(SNAPSHOT_KEY) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!("could not read timer snapshot: {e}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!("discarding corrupt timer snapshot: {e}");
            None
        }
    }
}

pub fn save_snapshot(store: &dyn KvStore, snapshot: &PersistedSnapshot) {
    let result = serde_json::to_string(snapshot)
        .map_err(CoreError::from)
        .and_then(|json| store.set(SNAPSHOT_KEY, &json).map_err(CoreError::from));
    if let Err(e) = result {
        tracing::warn!("could not persist timer snapshot: {e}");
    }
}
