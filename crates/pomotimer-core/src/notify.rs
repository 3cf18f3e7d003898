//! Notification sinks.
//!
//! The timer calls [`NotificationSink::notify`] once per phase completion
//! and never reacts to the outcome beyond logging it.

use std::io::Write;
use std::sync::Mutex;

use crate::error::NotifyError;
use crate::storage::NotificationsConfig;

pub const DEFAULT_TITLE: &str = "Pomodoro Timer";

/// A user-visible alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            message: message.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Delivers alerts to the user.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Writes alerts to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        tracing::info!(title = %notice.title, "{}", notice.message);
        Ok(())
    }
}

/// Prints alerts to a terminal, optionally ringing the bell.
pub struct TerminalNotifier<W: Write + Send = std::io::Stderr> {
    out: Mutex<W>,
    title: Option<String>,
    bell: bool,
    enabled: bool,
}

impl TerminalNotifier {
    pub fn stderr(config: &NotificationsConfig) -> Self {
        Self::with_writer(std::io::stderr(), config)
    }
}

impl<W: Write + Send> TerminalNotifier<W> {
    pub fn with_writer(out: W, config: &NotificationsConfig) -> Self {
        Self {
            out: Mutex::new(out),
            title: Some(config.title.clone()).filter(|t| !t.is_empty()),
            bell: config.bell,
            enabled: config.enabled,
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> NotificationSink for TerminalNotifier<W> {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        if !self.enabled {
            return Err(NotifyError::Disabled);
        }
        let title = self.title.as_deref().unwrap_or(&notice.title);
        let mut out = self
            .out
            .lock()
            .map_err(|_| NotifyError::DeliveryFailed("writer lock poisoned".into()))?;
        let bell = if self.bell { "\x07" } else { "" };
        writeln!(out, "{bell}[{title}] {}", notice.message)
            .and_then(|()| out.flush())
            .map_err(|e| NotifyError::DeliveryFailed(e.to_string()))
    }
}
