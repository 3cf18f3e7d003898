//! Timer engine implementation.
//!
//! The engine is a wall-clock-based state machine with no threads and no
//! timers of its own. Every command takes the current time and returns the
//! [`Action`]s the caller must carry out: publish a state, start or stop
//! the periodic tick, schedule a deferred step, or deliver a notification.
//! [`super::TimerService`] is the caller that runs all of this on tokio.
//!
//! ## State Transitions
//!
//! ```text
//!             start                 00:00 + completion
//! Idle(work) ──────► Running(work) ─────────────────► Idle(break) ─┐
//!     ▲                                                             │ settle, start
//!     │ restart_pomodoro                                            ▼
//! BreakFinished ◄──────────────── 00:00 + completion ───── Running(break)
//! ```
//!
//! Remaining time is always `end - now`, never a decrementing counter.

use std::time::Duration;

use super::snapshot::{PersistedSnapshot, Restore};
use super::state::{Phase, TimerState};
use crate::notify::Notice;
use crate::settings::TimerConfiguration;

pub const WORK_COMPLETE_MESSAGE: &str = "Good job! Time for a break!";
pub const BREAK_FINISHED_MESSAGE: &str = "Break time finished! Ready to work?";

/// Delays and tick rate used when running the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTuning {
    pub tick_interval: Duration,
    /// Gap between publishing `00:00` and handling completion.
    pub completion_delay: Duration,
    pub break_start_delay: Duration,
    pub restart_delay: Duration,
}

impl Default for TimerTuning {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
            completion_delay: Duration::from_millis(100),
            break_start_delay: Duration::from_millis(500),
            restart_delay: Duration::from_millis(300),
        }
    }
}

/// A step the engine wants run later, after a settle delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Finish the phase that just hit zero.
    Complete,
    /// Start the break that follows a finished work session.
    StartBreak,
    /// Start work after `restart_pomodoro`.
    StartWork,
}

impl Deferred {
    pub fn delay(self, tuning: &TimerTuning) -> Duration {
        match self {
            Deferred::Complete => tuning.completion_delay,
            Deferred::StartBreak => tuning.break_start_delay,
            Deferred::StartWork => tuning.restart_delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Publish(TimerState),
    StartTicking,
    StopTicking,
    /// Replaces any deferred step still waiting.
    Defer(Deferred),
    CancelDeferred,
    Notify(Notice),
}

/// Core timer state machine.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    config: TimerConfiguration,
    state: TimerState,
    /// Epoch milliseconds at which the running phase ends.
    end_ms: Option<u64>,
    pending: Option<Deferred>,
}

impl TimerEngine {
    /// Starts in `Idle(work)` at the configured work duration.
    pub fn new(config: TimerConfiguration) -> Self {
        Self {
            config,
            state: TimerState::idle(Phase::Work, config.work_secs()),
            end_ms: None,
            pending: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn config(&self) -> TimerConfiguration {
        self.config
    }

    pub fn pending(&self) -> Option<Deferred> {
        self.pending
    }

    pub fn end_ms(&self) -> Option<u64> {
        self.end_ms
    }

    pub fn snapshot(&self, now_ms: u64) -> PersistedSnapshot {
        PersistedSnapshot::capture(&self.state, now_ms)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin counting down from what is displayed. A finished break needs
    /// [`restart_pomodoro`](Self::restart_pomodoro) instead.
    pub fn start(&mut self, now_ms: u64) -> Vec<Action> {
        let mut out = Vec::new();
        if self.state.break_finished {
            tracing::debug!("start ignored: break finished, waiting for restart");
            return out;
        }
        self.start_into(now_ms, &mut out);
        out
    }

    /// Cancel ticking without touching the remaining time.
    pub fn stop(&mut self) -> Vec<Action> {
        let mut out = Vec::new();
        self.stop_into(&mut out);
        out
    }

    /// Back to the baseline of the current phase.
    pub fn reset(&mut self) -> Vec<Action> {
        let mut out = Vec::new();
        self.reset_into(&mut out);
        out
    }

    /// Running timers reset rather than pause.
    pub fn toggle(&mut self, now_ms: u64) -> Vec<Action> {
        if self.state.running {
            self.reset()
        } else {
            self.start(now_ms)
        }
    }

    /// From any break state: switch to idle work at full duration and start
    /// it after the restart delay. Ignored during work.
    pub fn restart_pomodoro(&mut self) -> Vec<Action> {
        let mut out = Vec::new();
        if !self.state.is_break {
            return out;
        }
        self.stop_into(&mut out);
        self.state = TimerState::idle(Phase::Work, self.config.work_secs());
        self.publish(&mut out);
        self.defer(Deferred::StartWork, &mut out);
        out
    }

    /// Recompute the display from the end time.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Action> {
        let mut out = Vec::new();
        if !self.state.running || self.pending == Some(Deferred::Complete) {
            return out;
        }
        let Some(end_ms) = self.end_ms else {
            return out;
        };

        let remaining_ms = end_ms.saturating_sub(now_ms);
        if remaining_ms == 0 {
            self.state.set_remaining(0);
            self.publish(&mut out);
            out.push(Action::StopTicking);
            self.defer(Deferred::Complete, &mut out);
            return out;
        }

        let secs = remaining_ms.div_ceil(1000);
        if secs != self.state.total_secs() {
            self.state.set_remaining(secs);
            self.publish(&mut out);
        }
        out
    }

    /// Run a deferred step. Steps that were cancelled or superseded since
    /// they were scheduled do nothing.
    pub fn fire(&mut self, deferred: Deferred, now_ms: u64) -> Vec<Action> {
        let mut out = Vec::new();
        if self.pending != Some(deferred) {
            return out;
        }
        self.pending = None;
        match deferred {
            Deferred::Complete => self.complete_into(&mut out),
            Deferred::StartBreak | Deferred::StartWork => self.start_into(now_ms, &mut out),
        }
        out
    }

    /// New durations always replace the old ones, but only an idle timer
    /// shows them right away.
    pub fn apply_config(&mut self, config: TimerConfiguration) -> Vec<Action> {
        let mut out = Vec::new();
        self.config = config;
        if !self.state.running {
            self.reset_into(&mut out);
        }
        out
    }

    /// Rebuild state from a snapshot taken before the process went away.
    pub fn restore(&mut self, snapshot: Option<&PersistedSnapshot>, now_ms: u64) -> Vec<Action> {
        let plan = snapshot.map_or(Restore::Fresh, |s| s.plan(now_ms));
        tracing::debug!(?plan, "restoring timer");

        let mut out = Vec::new();
        self.stop_into(&mut out);
        self.pending = None;
        match plan {
            Restore::Fresh => {
                self.state = TimerState::idle(Phase::Work, self.config.work_secs());
                self.publish(&mut out);
            }
            Restore::Idle {
                phase,
                remaining_secs,
            } => {
                self.state = TimerState::idle(phase, remaining_secs);
                self.publish(&mut out);
            }
            Restore::Resume {
                phase,
                remaining_secs,
            } => {
                self.state = TimerState::idle(phase, remaining_secs);
                self.start_into(now_ms, &mut out);
            }
            Restore::BreakFinished => {
                self.state = TimerState::idle(Phase::Break, 0);
                self.state.break_finished = true;
                self.publish(&mut out);
            }
            Restore::WorkElapsed => {
                tracing::info!("work session ended while suspended, starting break");
                self.state = TimerState::idle(Phase::Break, self.config.break_secs());
                self.start_into(now_ms, &mut out);
            }
        }
        out
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn phase_secs(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Work => self.config.work_secs(),
            Phase::Break => self.config.break_secs(),
        }
    }

    fn publish(&self, out: &mut Vec<Action>) {
        out.push(Action::Publish(self.state.clone()));
    }

    fn defer(&mut self, deferred: Deferred, out: &mut Vec<Action>) {
        self.pending = Some(deferred);
        out.push(Action::Defer(deferred));
    }

    fn start_into(&mut self, now_ms: u64, out: &mut Vec<Action>) {
        if self.state.running || self.state.break_finished {
            return;
        }
        let duration_ms = self.state.total_secs().saturating_mul(1000);
        self.end_ms = Some(now_ms.saturating_add(duration_ms));
        self.state.running = true;
        out.push(Action::StartTicking);
        self.publish(out);
    }

    fn stop_into(&mut self, out: &mut Vec<Action>) {
        out.push(Action::StopTicking);
        self.end_ms = None;
        if self.state.running {
            self.state.running = false;
            self.publish(out);
        }
    }

    fn reset_into(&mut self, out: &mut Vec<Action>) {
        self.stop_into(out);
        // A timer reset at 00:00 never completes.
        if self.pending == Some(Deferred::Complete) {
            self.pending = None;
            out.push(Action::CancelDeferred);
        }
        let phase = self.state.phase();
        self.state = TimerState::idle(phase, self.phase_secs(phase));
        self.publish(out);
    }

    fn complete_into(&mut self, out: &mut Vec<Action>) {
        self.stop_into(out);
        if self.state.is_break {
            tracing::info!("break finished");
            out.push(Action::Notify(Notice::new(BREAK_FINISHED_MESSAGE)));
            self.state.break_finished = true;
            self.publish(out);
        } else {
            tracing::info!("work session complete");
            out.push(Action::Notify(Notice::new(WORK_COMPLETE_MESSAGE)));
            self.state = TimerState::idle(Phase::Break, self.config.break_secs());
            self.publish(out);
            self.defer(Deferred::StartBreak, out);
        }
    }
}
