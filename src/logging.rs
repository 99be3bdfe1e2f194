//! Scoped, leveled logging with a bounded in-memory history
//!
//! Every record goes to the [`log`] facade (target = the logger's scope) and is
//! also kept in a [`LogHistory`] ring buffer owned by whoever built the logger,
//! so a run's diagnostics can be exported after the fact.

use chrono::{DateTime, Utc};
use log::Level;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};

/// Default number of records kept by [`LogHistory`]
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// One captured log line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub scope: String,
    pub message: String,
}

/// Bounded ring buffer of [`LogRecord`]s; the oldest record is evicted first
#[derive(Debug)]
pub struct LogHistory {
    capacity: usize,
    records: Mutex<VecDeque<LogRecord>>,
}

impl LogHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Create a history wrapped for sharing between loggers
    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, record: LogRecord) {
        if self.capacity == 0 {
            return;
        }
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Snapshot of the buffered records, oldest first
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Export the buffered records as pretty JSON for diagnostics
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.records())
    }
}

impl Default for LogHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Logger bound to a scope name and a shared [`LogHistory`]
#[derive(Debug, Clone)]
pub struct Logger {
    scope: String,
    min_level: Level,
    history: Arc<LogHistory>,
}

impl Logger {
    pub fn new(scope: impl Into<String>, history: Arc<LogHistory>) -> Self {
        Self {
            scope: scope.into(),
            min_level: Level::Debug,
            history,
        }
    }

    /// Builder method: lowest level that is still recorded in the history
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Derive a child logger (`parent.child`) sharing the same history
    pub fn scoped(&self, child: &str) -> Self {
        Self {
            scope: format!("{}.{}", self.scope, child),
            min_level: self.min_level,
            history: Arc::clone(&self.history),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn history(&self) -> &Arc<LogHistory> {
        &self.history
    }

    pub fn log(&self, level: Level, message: impl Display) {
        let message = message.to_string();
        log::log!(target: self.scope.as_str(), level, "{}", message);

        // Level ordering in `log`: Error < Warn < Info < Debug < Trace
        if level <= self.min_level {
            self.history.push(LogRecord {
                timestamp: Utc::now(),
                level,
                scope: self.scope.clone(),
                message,
            });
        }
    }

    pub fn trace(&self, message: impl Display) {
        self.log(Level::Trace, message);
    }

    pub fn debug(&self, message: impl Display) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl Display) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: impl Display) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: impl Display) {
        self.log(Level::Error, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("browser_fsm", LogHistory::shared(DEFAULT_HISTORY_CAPACITY))
    }
}
