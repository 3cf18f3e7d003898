//! Runs a [`TimerEngine`] on tokio.
//!
//! One task owns the engine and is the only place it is mutated. Commands
//! arrive over a channel and are acknowledged after the resulting state has
//! been published and persisted. The tick interval and the single deferred
//! step live in that task too, so ending the task cancels everything at
//! once.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::engine::{Action, Deferred, TimerEngine, TimerTuning};
use super::snapshot::{load_snapshot, save_snapshot, PersistedSnapshot};
use super::state::TimerState;
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::notify::NotificationSink;
use crate::settings::TimerConfiguration;
use crate::storage::KvStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
    Reset,
    Toggle,
    RestartPomodoro,
}

struct Request {
    command: Command,
    ack: oneshot::Sender<TimerState>,
}

/// Handle to a running timer.
///
/// Dropping the handle aborts the timer task; prefer
/// [`shutdown`](Self::shutdown) to wait for it to finish.
pub struct TimerService {
    commands: mpsc::UnboundedSender<Request>,
    state: watch::Receiver<TimerState>,
    task: Option<JoinHandle<()>>,
}

impl TimerService {
    /// Restore from the persisted snapshot and start the timer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        mut durations: watch::Receiver<TimerConfiguration>,
        notifier: Arc<dyn NotificationSink>,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        tuning: TimerTuning,
    ) -> Self {
        let config = *durations.borrow_and_update();
        let mut engine = TimerEngine::new(config);
        let snapshot = load_snapshot(store.as_ref());
        let actions = engine.restore(snapshot.as_ref(), clock.now_ms());

        let (state_tx, state_rx) = watch::channel(engine.state().clone());
        let (commands, command_rx) = mpsc::unbounded_channel();

        let mut actor = TimerActor {
            engine,
            store,
            notifier,
            clock,
            tuning,
            state_tx,
            ticker: None,
            deferred: None,
        };
        actor.apply(actions);
        tracing::info!(state = %actor.engine.state(), "timer ready");

        let task = tokio::spawn(actor.run(command_rx, durations));
        Self {
            commands,
            state: state_rx,
            task: Some(task),
        }
    }

    /// The most recently published state.
    pub fn state(&self) -> TimerState {
        self.state.borrow().clone()
    }

    /// A receiver that sees the current state immediately and every change
    /// after it.
    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.state.clone()
    }

    pub async fn start(&self) -> Result<TimerState> {
        self.send(Command::Start).await
    }

    pub async fn stop(&self) -> Result<TimerState> {
        self.send(Command::Stop).await
    }

    pub async fn reset(&self) -> Result<TimerState> {
        self.send(Command::Reset).await
    }

    pub async fn toggle(&self) -> Result<TimerState> {
        self.send(Command::Toggle).await
    }

    pub async fn restart_pomodoro(&self) -> Result<TimerState> {
        self.send(Command::RestartPomodoro).await
    }

    /// Stop the timer task and wait for it. Nothing is published, persisted
    /// or notified afterwards; the last snapshot stays on disk for the next
    /// start.
    pub async fn shutdown(mut self) {
        let task = self.task.take();
        // Closing the command channel ends the task's loop.
        drop(self);
        if let Some(task) = task {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!("timer task ended abnormally: {e}");
                }
            }
        }
    }

    async fn send(&self, command: Command) -> Result<TimerState> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Request { command, ack })
            .map_err(|_| CoreError::TimerClosed)?;
        done.await.map_err(|_| CoreError::TimerClosed)
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct TimerActor {
    engine: TimerEngine,
    store: Arc<dyn KvStore>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    tuning: TimerTuning,
    state_tx: watch::Sender<TimerState>,
    ticker: Option<Interval>,
    deferred: Option<(Deferred, Instant)>,
}

impl TimerActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Request>,
        mut durations: watch::Receiver<TimerConfiguration>,
    ) {
        let mut settings_open = true;
        loop {
            tokio::select! {
                biased;
                request = commands.recv() => match request {
                    Some(request) => self.handle(request),
                    None => break,
                },
                changed = durations.changed(), if settings_open => match changed {
                    Ok(()) => {
                        let config = *durations.borrow_and_update();
                        tracing::debug!(?config, "durations changed");
                        let actions = self.engine.apply_config(config);
                        self.apply(actions);
                    }
                    Err(_) => settings_open = false,
                },
                _ = next_tick(&mut self.ticker), if self.ticker.is_some() => {
                    let actions = self.engine.tick(self.clock.now_ms());
                    self.apply(actions);
                }
                deferred = deferred_due(self.deferred), if self.deferred.is_some() => {
                    self.deferred = None;
                    let actions = self.engine.fire(deferred, self.clock.now_ms());
                    self.apply(actions);
                }
            }
        }
        tracing::debug!("timer task stopped");
    }

    fn handle(&mut self, request: Request) {
        let now = self.clock.now_ms();
        tracing::debug!(command = ?request.command, "timer command");
        let actions = match request.command {
            Command::Start => self.engine.start(now),
            Command::Stop => self.engine.stop(),
            Command::Reset => self.engine.reset(),
            Command::Toggle => self.engine.toggle(now),
            Command::RestartPomodoro => self.engine.restart_pomodoro(),
        };
        self.apply(actions);
        // The caller may have stopped waiting.
        let _ = request.ack.send(self.engine.state().clone());
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Publish(state) => {
                    tracing::trace!(%state, "publish");
                    let snapshot = PersistedSnapshot::capture(&state, self.clock.now_ms());
                    self.state_tx.send_replace(state);
                    save_snapshot(self.store.as_ref(), &snapshot);
                }
                Action::StartTicking => {
                    let mut ticker = tokio::time::interval(self.tuning.tick_interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    self.ticker = Some(ticker);
                }
                Action::StopTicking => self.ticker = None,
                Action::Defer(deferred) => {
                    let at = Instant::now() + deferred.delay(&self.tuning);
                    self.deferred = Some((deferred, at));
                }
                Action::CancelDeferred => self.deferred = None,
                Action::Notify(notice) => {
                    if let Err(e) = self.notifier.notify(&notice) {
                        tracing::warn!(message = %notice.message, "notification failed: {e}");
                    }
                }
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn deferred_due(slot: Option<(Deferred, Instant)>) -> Deferred {
    match slot {
        Some((deferred, at)) => {
            tokio::time::sleep_until(at).await;
            deferred
        }
        None => std::future::pending().await,
    }
}
