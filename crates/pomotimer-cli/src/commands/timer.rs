use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use pomotimer_core::{
    Clock, Config, NotificationSink, SystemClock, TerminalNotifier, TimerService, TimerState,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::open_settings;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start counting down
    Start,
    /// Stop without resetting the remaining time
    Stop,
    /// Reset the current phase to its full duration
    Reset,
    /// Start if idle, reset if running
    Toggle,
    /// After a break, go back to work and start
    Restart,
    /// Print current timer state as JSON
    Status,
    /// Run in the foreground, reading t/s/r/p/q commands from stdin
    Run {
        /// Start counting down immediately
        #[arg(long)]
        start: bool,
    },
}

pub fn run(action: TimerAction, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_async(action, config))
}

async fn run_async(action: TimerAction, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let (store, settings) = open_settings(config)?;
    let notifier: Arc<dyn NotificationSink> =
        Arc::new(TerminalNotifier::stderr(&config.notifications));
    let tuning = config.timer_tuning();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = TimerService::spawn(
        settings.durations(),
        notifier,
        store,
        clock.clone(),
        tuning,
    );

    let state = match action {
        TimerAction::Start => {
            let state = service.start().await?;
            if state.break_finished {
                eprintln!("break finished; use `pomotimer timer restart` to begin the next session");
            }
            state
        }
        TimerAction::Stop => service.stop().await?,
        TimerAction::Reset => service.reset().await?,
        TimerAction::Toggle => service.toggle().await?,
        TimerAction::Restart => {
            let on_break = service.state().is_break;
            let state = service.restart_pomodoro().await?;
            if on_break {
                // Let the deferred start land in the snapshot before exiting.
                wait_until_running(&service, tuning.restart_delay * 2).await
            } else {
                state
            }
        }
        TimerAction::Status => service.state(),
        TimerAction::Run { start } => return foreground(service, clock.as_ref(), start).await,
    };

    println!("{}", serde_json::to_string_pretty(&state)?);
    service.shutdown().await;
    Ok(())
}

async fn wait_until_running(service: &TimerService, limit: Duration) -> TimerState {
    let mut states = service.subscribe();
    let wait = async {
        while !states.borrow_and_update().running {
            if states.changed().await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(limit, wait).await.is_err() {
        tracing::warn!("timer did not start within {limit:?}");
    }
    service.state()
}

async fn foreground(
    service: TimerService,
    clock: &dyn Clock,
    start: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if start {
        service.start().await?;
    }

    let mut states = service.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    // Keeps the time of day current while the timer is idle.
    let mut refresh = tokio::time::interval(Duration::from_secs(1));
    refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    eprintln!("commands: t toggle, s stop, r reset, p restart after break, q quit");
    render(clock, &states.borrow_and_update())?;

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                render(clock, &states.borrow_and_update())?;
            }
            _ = refresh.tick() => render(clock, &states.borrow())?,
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    let result = match line.trim() {
                        "t" => service.toggle().await,
                        "s" => service.stop().await,
                        "r" => service.reset().await,
                        "p" => service.restart_pomodoro().await,
                        "q" => break,
                        "" => continue,
                        other => {
                            eprintln!("unknown command: {other}");
                            continue;
                        }
                    };
                    result?;
                }
                None => stdin_open = false,
            },
            _ = &mut ctrl_c => break,
        }
    }

    println!();
    service.shutdown().await;
    Ok(())
}

fn render(clock: &dyn Clock, state: &TimerState) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    write!(out, "\r\x1b[2K[{}] {state}", clock.time_of_day())?;
    out.flush()
}
