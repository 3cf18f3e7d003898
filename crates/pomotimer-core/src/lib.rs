//! # pomotimer core library
//!
//! A single work/break countdown timer that survives process suspension.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a wall-clock-based state machine. Commands take the
//!   current time and return the actions to perform; it owns no threads.
//! - **Timer Service**: runs the engine on a tokio task, ticking it,
//!   scheduling settle delays, persisting a snapshot after every change and
//!   publishing state over a `watch` channel.
//! - **Settings**: validated work/break durations, persisted as JSON.
//! - **Storage**: a small key-value trait with SQLite and in-memory stores,
//!   plus the TOML application config.
//! - **Notifications**: a sink trait called once per finished phase.
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: core timer state machine
//! - [`TimerService`]: the engine running on tokio
//! - [`SettingsStore`]: duration settings and their change stream
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod notify;
pub mod settings;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, NotifyError, StorageError};
pub use notify::{LogNotifier, Notice, NotificationSink, TerminalNotifier};
pub use settings::{SettingsStore, TimerConfiguration};
pub use storage::{Config, KvStore, MemoryStore, SqliteStore};
pub use timer::{Phase, PersistedSnapshot, TimerEngine, TimerService, TimerState, TimerStatus, TimerTuning};
