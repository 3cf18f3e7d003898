mod engine;
mod service;
mod snapshot;
mod state;

pub use engine::{
    Action, Deferred, TimerEngine, TimerTuning, BREAK_FINISHED_MESSAGE, WORK_COMPLETE_MESSAGE,
};
pub use service::TimerService;
pub use snapshot::{load_snapshot, save_snapshot, PersistedSnapshot, Restore, SNAPSHOT_KEY};
pub use state::{format_unit, Phase, TimerState, TimerStatus};
