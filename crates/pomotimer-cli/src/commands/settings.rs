use clap::Subcommand;
use pomotimer_core::Config;

use super::open_settings;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the current durations as JSON
    Show,
    /// Change durations; values are clamped to 1-60 (work) and 1-30 (break)
    Set {
        /// Work duration in minutes
        #[arg(long, allow_negative_numbers = true)]
        work: Option<f64>,
        /// Break duration in minutes
        #[arg(long = "break", allow_negative_numbers = true)]
        break_minutes: Option<f64>,
    },
}

pub fn run(action: SettingsAction, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let (_store, settings) = open_settings(config)?;

    match action {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&settings.current())?);
        }
        SettingsAction::Set {
            work,
            break_minutes,
        } => {
            if work.is_none() && break_minutes.is_none() {
                return Err("nothing to set: pass --work and/or --break".into());
            }
            let current = settings.current();
            let saved = settings.save_raw(
                work.unwrap_or(f64::from(current.work_duration)),
                break_minutes.unwrap_or(f64::from(current.break_duration)),
            )?;
            println!("{}", serde_json::to_string_pretty(&saved)?);
        }
    }
    Ok(())
}
