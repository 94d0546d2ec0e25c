//! Append-only record of everything a run did.
//!
//! The orchestrator writes here from concurrent item tasks; the CLI reads
//! it once at the end (and renders it for `--log-file`). Entries only ever
//! accumulate, so a poisoned lock just means some writer panicked mid-push
//! and the entries written so far are still good.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One run-log line with optional vault/item context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub vault: Option<String>,
    pub item: Option<String>,
    pub message: String,
}

/// Concurrency-safe append-only log for one migration run.
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Mutex<Vec<RunLogEntry>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: LogLevel, vault: Option<&str>, item: Option<&str>, message: String) {
        let entry = RunLogEntry {
            at: Utc::now(),
            level,
            vault: vault.map(|v| v.to_string()),
            item: item.map(|i| i.to_string()),
            message,
        };
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    pub fn info(&self, vault: Option<&str>, item: Option<&str>, message: impl Into<String>) {
        self.push(LogLevel::Info, vault, item, message.into());
    }

    pub fn warn(&self, vault: Option<&str>, item: Option<&str>, message: impl Into<String>) {
        self.push(LogLevel::Warn, vault, item, message.into());
    }

    pub fn error(&self, vault: Option<&str>, item: Option<&str>, message: impl Into<String>) {
        self.push(LogLevel::Error, vault, item, message.into());
    }

    /// Copy of every entry in append order.
    pub fn snapshot(&self) -> Vec<RunLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn warning_count(&self) -> usize {
        self.count_level(LogLevel::Warn)
    }

    pub fn error_count(&self) -> usize {
        self.count_level(LogLevel::Error)
    }

    fn count_level(&self, level: LogLevel) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|entry| entry.level == level)
            .count()
    }

    /// Plain-text rendering, one line per entry. Generated on demand; this
    /// is what `--log-file` writes out.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for entry in self.snapshot() {
            out.push_str(&format!(
                "{} {:<5}",
                entry.at.format("%Y-%m-%dT%H:%M:%SZ"),
                entry.level
            ));
            if let Some(vault) = &entry.vault {
                out.push_str(&format!(" [vault {}]", vault));
            }
            if let Some(item) = &entry.item {
                out.push_str(&format!(" [item {}]", item));
            }
            out.push(' ');
            out.push_str(&entry.message);
            out.push('\n');
        }
        out
    }
}
