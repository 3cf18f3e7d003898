pub mod config;
pub mod settings;
pub mod timer;

use std::sync::Arc;

use pomotimer_core::{Config, KvStore, SettingsStore, SqliteStore};

/// Open the configured database and load the saved durations from it.
pub fn open_settings(
    config: &Config,
) -> Result<(Arc<dyn KvStore>, SettingsStore), Box<dyn std::error::Error>> {
    let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open_at(&config.database_path()?)?);
    let settings = SettingsStore::new(store.clone());
    settings.load();
    Ok((store, settings))
}
