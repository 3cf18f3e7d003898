use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Work,
    Break,
}

/// Coarse view of [`TimerState`] for callers that want to match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Idle(Phase),
    Running(Phase),
    BreakFinished,
}

/// What observers see. Minutes and seconds are two-digit, zero-padded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub minutes: String,
    pub seconds: String,
    pub running: bool,
    pub is_break: bool,
    pub break_finished: bool,
}

impl TimerState {
    /// A stopped timer showing `secs` in the given phase.
    pub fn idle(phase: Phase, secs: u64) -> Self {
        let mut state = Self {
            minutes: String::new(),
            seconds: String::new(),
            running: false,
            is_break: phase == Phase::Break,
            break_finished: false,
        };
        state.set_remaining(secs);
        state
    }

    pub fn phase(&self) -> Phase {
        if self.is_break {
            Phase::Break
        } else {
            Phase::Work
        }
    }

    pub fn status(&self) -> TimerStatus {
        if self.break_finished {
            TimerStatus::BreakFinished
        } else if self.running {
            TimerStatus::Running(self.phase())
        } else {
            TimerStatus::Idle(self.phase())
        }
    }

    /// Total remaining seconds, or `None` if the display fields are not
    /// numeric.
    pub fn try_total_secs(&self) -> Option<u64> {
        let minutes: u64 = self.minutes.parse().ok()?;
        let seconds: u64 = self.seconds.parse().ok()?;
        Some(minutes * 60 + seconds)
    }

    pub fn total_secs(&self) -> u64 {
        self.try_total_secs().unwrap_or(0)
    }

    pub fn set_remaining(&mut self, secs: u64) {
        self.minutes = format_unit(secs / 60);
        self.seconds = format_unit(secs % 60);
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.status() {
            TimerStatus::Idle(Phase::Work) => "work (idle)",
            TimerStatus::Idle(Phase::Break) => "break (idle)",
            TimerStatus::Running(Phase::Work) => "work",
            TimerStatus::Running(Phase::Break) => "break",
            TimerStatus::BreakFinished => "break finished",
        };
        write!(f, "{}:{} {label}", self.minutes, self.seconds)
    }
}

pub fn format_unit(value: u64) -> String {
    format!("{value:02}")
}
