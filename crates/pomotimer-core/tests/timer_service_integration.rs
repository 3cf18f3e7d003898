//! Integration tests for the timer service.
//!
//! Every test runs on a paused tokio clock. `PausedClock` derives wall-clock
//! time from tokio's clock so `sleep` moves both the tick schedule and the
//! time the engine sees.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pomotimer_core::error::NotifyError;
use pomotimer_core::timer::{
    PersistedSnapshot, BREAK_FINISHED_MESSAGE, SNAPSHOT_KEY, WORK_COMPLETE_MESSAGE,
};
use pomotimer_core::{
    Clock, KvStore, ManualClock, MemoryStore, Notice, NotificationSink, Phase, SettingsStore,
    TimerConfiguration, TimerService, TimerState, TimerStatus, TimerTuning,
};
use tokio::time::{sleep, Instant};

const BASE_MS: u64 = 1_700_000_000_000;

// ============================================================================
// Test Helpers
// ============================================================================

struct PausedClock {
    origin: Instant,
}

impl PausedClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now_ms(&self) -> u64 {
        BASE_MS + self.origin.elapsed().as_millis() as u64
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

struct FailingNotifier;

impl NotificationSink for FailingNotifier {
    fn notify(&self, _notice: &Notice) -> Result<(), NotifyError> {
        Err(NotifyError::DeliveryFailed("no display".into()))
    }
}

struct Harness {
    service: TimerService,
    settings: SettingsStore,
    notifier: Arc<RecordingNotifier>,
    store: Arc<MemoryStore>,
}

fn harness_with(store: Arc<MemoryStore>, work: u32, brk: u32, clock: Arc<dyn Clock>) -> Harness {
    let settings = SettingsStore::new(store.clone());
    settings
        .save(TimerConfiguration {
            work_duration: work,
            break_duration: brk,
        })
        .unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let service = TimerService::spawn(
        settings.durations(),
        notifier.clone(),
        store.clone(),
        clock,
        TimerTuning::default(),
    );
    Harness {
        service,
        settings,
        notifier,
        store,
    }
}

fn harness(work: u32, brk: u32) -> Harness {
    harness_with(
        Arc::new(MemoryStore::new()),
        work,
        brk,
        Arc::new(PausedClock::new()),
    )
}

/// Collect every state the service publishes from now on.
fn record_states(service: &TimerService) -> Arc<Mutex<Vec<TimerState>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut rx = service.subscribe();
    let sink = seen.clone();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            sink.lock().unwrap().push(state);
        }
    });
    seen
}

fn stored_snapshot(store: &MemoryStore) -> PersistedSnapshot {
    serde_json::from_str(&store.get(SNAPSHOT_KEY).unwrap().unwrap()).unwrap()
}

fn display(state: &TimerState) -> (&str, &str) {
    (state.minutes.as_str(), state.seconds.as_str())
}

// ============================================================================
// Countdown and completion
// ============================================================================

#[tokio::test(start_paused = true)]
async fn work_session_completes_into_running_break() {
    let h = harness(1, 1);
    let seen = record_states(&h.service);

    h.service.start().await.unwrap();
    sleep(Duration::from_millis(61_000)).await;

    assert_eq!(h.notifier.messages(), vec![WORK_COMPLETE_MESSAGE.to_string()]);
    assert_eq!(
        h.service.state(),
        TimerState {
            minutes: "01".into(),
            seconds: "00".into(),
            running: true,
            is_break: true,
            break_finished: false,
        }
    );

    let seen = seen.lock().unwrap();
    let zero = seen
        .iter()
        .position(|s| s.total_secs() == 0 && !s.is_break)
        .expect("00:00 was observable before the transition");
    let first_break = seen.iter().position(|s| s.is_break).unwrap();
    assert!(zero < first_break);
}

#[tokio::test(start_paused = true)]
async fn countdown_follows_wall_clock() {
    let h = harness(10, 5);
    h.service.start().await.unwrap();

    sleep(Duration::from_millis(15_100)).await;
    assert_eq!(display(&h.service.state()), ("09", "45"));

    sleep(Duration::from_millis(60_000)).await;
    assert_eq!(display(&h.service.state()), ("08", "45"));
}

#[tokio::test(start_paused = true)]
async fn break_finishes_and_restart_begins_work() {
    let h = harness(1, 1);
    h.service.start().await.unwrap();
    sleep(Duration::from_secs(125)).await;

    assert_eq!(h.service.state().status(), TimerStatus::BreakFinished);
    assert_eq!(
        h.notifier.messages(),
        vec![
            WORK_COMPLETE_MESSAGE.to_string(),
            BREAK_FINISHED_MESSAGE.to_string()
        ]
    );

    // Halted: nothing else happens on its own.
    sleep(Duration::from_secs(30)).await;
    assert_eq!(h.service.state().status(), TimerStatus::BreakFinished);

    let state = h.service.restart_pomodoro().await.unwrap();
    assert_eq!(state, TimerState::idle(Phase::Work, 60));

    sleep(Duration::from_millis(400)).await;
    let state = h.service.state();
    assert_eq!(state.status(), TimerStatus::Running(Phase::Work));
    assert_eq!(display(&state), ("01", "00"));
    assert!(!state.break_finished);
    assert_eq!(h.notifier.messages().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn restart_is_ignored_during_work() {
    let h = harness(25, 5);
    h.service.start().await.unwrap();
    sleep(Duration::from_secs(3)).await;
    let before = h.service.state();
    let after = h.service.restart_pomodoro().await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test(start_paused = true)]
async fn notification_failure_keeps_transition() {
    let store = Arc::new(MemoryStore::new());
    let settings = SettingsStore::new(store.clone());
    settings.save_raw(1.0, 2.0).unwrap();
    let service = TimerService::spawn(
        settings.durations(),
        Arc::new(FailingNotifier),
        store,
        Arc::new(PausedClock::new()),
        TimerTuning::default(),
    );

    service.start().await.unwrap();
    sleep(Duration::from_secs(61)).await;
    let state = service.state();
    assert_eq!(state.status(), TimerStatus::Running(Phase::Break));
    assert_eq!(display(&state), ("02", "00"));
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test(start_paused = true)]
async fn toggle_round_trip_returns_to_baseline() {
    let h = harness(25, 5);
    let baseline = h.service.state();

    let running = h.service.toggle().await.unwrap();
    assert!(running.running);
    sleep(Duration::from_secs(42)).await;
    assert_ne!(h.service.state(), running);

    let state = h.service.toggle().await.unwrap();
    assert_eq!(state, baseline);
}

#[tokio::test(start_paused = true)]
async fn stop_pauses_and_start_resumes() {
    let h = harness(25, 5);
    h.service.start().await.unwrap();
    sleep(Duration::from_millis(30_100)).await;

    let stopped = h.service.stop().await.unwrap();
    assert!(!stopped.running);
    assert_eq!(display(&stopped), ("24", "30"));

    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.service.state(), stopped);

    h.service.start().await.unwrap();
    sleep(Duration::from_millis(10_100)).await;
    assert_eq!(display(&h.service.state()), ("24", "20"));

    // Stopping twice is harmless.
    h.service.stop().await.unwrap();
    h.service.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn duration_changes_apply_when_idle() {
    let h = harness(25, 5);
    h.settings.save_raw(40.0, 10.0).unwrap();
    sleep(Duration::from_millis(1)).await;
    assert_eq!(h.service.state(), TimerState::idle(Phase::Work, 40 * 60));
}

#[tokio::test(start_paused = true)]
async fn duration_changes_wait_while_running() {
    let h = harness(25, 5);
    h.service.start().await.unwrap();
    sleep(Duration::from_millis(5_100)).await;

    h.settings.save_raw(50.0, 10.0).unwrap();
    sleep(Duration::from_millis(1)).await;
    let state = h.service.state();
    assert!(state.running);
    assert_eq!(display(&state), ("24", "55"));

    let state = h.service.reset().await.unwrap();
    assert_eq!(state, TimerState::idle(Phase::Work, 50 * 60));
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test(start_paused = true)]
async fn every_change_is_persisted() {
    let h = harness(25, 5);
    h.service.start().await.unwrap();
    sleep(Duration::from_millis(10_100)).await;

    let snap = stored_snapshot(&h.store);
    assert!(snap.is_active);
    assert!(!snap.is_break);
    assert_eq!((snap.minutes.as_str(), snap.seconds.as_str()), ("24", "50"));
    assert_eq!(snap.timestamp, BASE_MS + 10_000);

    h.service.reset().await.unwrap();
    let snap = stored_snapshot(&h.store);
    assert!(!snap.is_active);
    assert_eq!(snap.minutes, "25");
}

#[tokio::test(start_paused = true)]
async fn timer_keeps_counting_across_restart() {
    let store = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(PausedClock::new());

    let h = harness_with(store.clone(), 25, 5, clock.clone());
    h.service.start().await.unwrap();
    sleep(Duration::from_millis(10_100)).await;
    h.service.shutdown().await;

    // Process is gone for five minutes.
    sleep(Duration::from_secs(300)).await;

    let h = harness_with(store, 25, 5, clock);
    let state = h.service.state();
    assert!(state.running);
    assert_eq!(display(&state), ("19", "50"));
}

#[tokio::test(start_paused = true)]
async fn stopped_timer_keeps_remaining_across_restart() {
    let store = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(PausedClock::new());

    let h = harness_with(store.clone(), 10, 5, clock.clone());
    h.service.start().await.unwrap();
    sleep(Duration::from_millis(15_100)).await;
    let stopped = h.service.stop().await.unwrap();
    assert_eq!(display(&stopped), ("09", "45"));
    h.service.shutdown().await;

    // A stopped timer does not count while the process is gone.
    sleep(Duration::from_secs(600)).await;

    let h = harness_with(store, 10, 5, clock);
    let state = h.service.state();
    assert!(!state.running);
    assert!(!state.is_break);
    assert_eq!(display(&state), ("09", "45"));

    h.service.start().await.unwrap();
    sleep(Duration::from_millis(5_100)).await;
    assert_eq!(display(&h.service.state()), ("09", "40"));
}

#[tokio::test(start_paused = true)]
async fn out_of_range_snapshot_falls_back_to_idle_work() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            SNAPSHOT_KEY,
            r#"{"isBreak":false,"isActive":true,"minutes":"999999999999999999","seconds":"00","timestamp":1700000000000}"#,
        )
        .unwrap();
    let h = harness_with(store, 25, 5, Arc::new(PausedClock::new()));
    assert_eq!(h.service.state(), TimerState::idle(Phase::Work, 25 * 60));
}

#[tokio::test(start_paused = true)]
async fn restore_subtracts_suspended_time() {
    let store = Arc::new(MemoryStore::new());
    let snapshot = PersistedSnapshot {
        is_break: false,
        is_active: true,
        minutes: "10".into(),
        seconds: "00".into(),
        timestamp: BASE_MS,
    };
    store
        .set(SNAPSHOT_KEY, &serde_json::to_string(&snapshot).unwrap())
        .unwrap();

    let h = harness_with(
        store,
        25,
        5,
        Arc::new(ManualClock::new(BASE_MS + 15_000)),
    );
    let state = h.service.state();
    assert_eq!(display(&state), ("09", "45"));
    assert!(state.running);
    assert!(!state.is_break);
}

#[tokio::test(start_paused = true)]
async fn restore_after_work_overrun_starts_break() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            SNAPSHOT_KEY,
            r#"{"isBreak":false,"isActive":true,"minutes":"00","seconds":"10","timestamp":1700000000000}"#,
        )
        .unwrap();

    let h = harness_with(
        store,
        25,
        7,
        Arc::new(ManualClock::new(BASE_MS + 30_000)),
    );
    let state = h.service.state();
    assert_eq!(state.status(), TimerStatus::Running(Phase::Break));
    assert_eq!(display(&state), ("07", "00"));
}

#[tokio::test(start_paused = true)]
async fn corrupt_snapshot_falls_back_to_idle_work() {
    let store = Arc::new(MemoryStore::new());
    store.set(SNAPSHOT_KEY, "][").unwrap();
    let h = harness_with(store, 30, 5, Arc::new(PausedClock::new()));
    assert_eq!(h.service.state(), TimerState::idle(Phase::Work, 30 * 60));
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn nothing_happens_after_shutdown() {
    let h = harness(1, 1);
    let mut rx = h.service.subscribe();
    h.service.start().await.unwrap();

    // Stop between 00:00 and the deferred completion.
    sleep(Duration::from_millis(60_050)).await;
    assert_eq!(h.service.state().total_secs(), 0);
    let before = h.store.get(SNAPSHOT_KEY).unwrap();
    rx.borrow_and_update();

    h.service.shutdown().await;
    sleep(Duration::from_secs(5)).await;

    assert!(h.notifier.messages().is_empty());
    assert!(rx.changed().await.is_err(), "no further emissions");
    assert_eq!(h.store.get(SNAPSHOT_KEY).unwrap(), before);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_service_stops_ticking() {
    let h = harness(1, 1);
    h.service.start().await.unwrap();
    sleep(Duration::from_millis(1_100)).await;
    let before = h.store.get(SNAPSHOT_KEY).unwrap();

    drop(h.service);
    sleep(Duration::from_secs(120)).await;

    assert!(h.notifier.messages().is_empty());
    assert_eq!(h.store.get(SNAPSHOT_KEY).unwrap(), before);
}
