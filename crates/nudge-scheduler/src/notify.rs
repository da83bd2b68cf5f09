//! Debug notifications: levelled, timestamped operator messages.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use nudge_core::error::NudgeError;

/// Severity of a debug notification. Ordered: `Debug < Info < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotifyLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl NotifyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Parse a configured level; unknown names fall back to `Error`.
    pub fn parse_or_error(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            tracing::warn!("⚠️ Unknown debug level '{s}', using 'error'");
            Self::Error
        })
    }
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotifyLevel {
    type Err = NudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(NudgeError::Config(format!("Unknown debug level: {other}"))),
        }
    }
}

/// One operator notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotifyLevel,
    pub body: String,
    pub timestamp: DateTime<Local>,
}

impl Notification {
    pub fn new(level: NotifyLevel, body: &str) -> Self {
        Self {
            level,
            body: body.to_string(),
            timestamp: Local::now(),
        }
    }

    /// Error report, with the error text in a fenced block when present.
    pub fn error(context: &str, error: Option<&dyn fmt::Display>) -> Self {
        let body = match error {
            Some(e) => format!("{context}\n```\n{e}\n```"),
            None => context.to_string(),
        };
        Self::new(NotifyLevel::Error, &body)
    }

    /// `[YYYY-mm-dd HH:MM:SS] **LEVEL**: body`
    pub fn render(&self) -> String {
        format!(
            "[{}] **{}**: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.body
        )
    }
}
