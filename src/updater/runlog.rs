//! Capacity-bounded run log shown to operators.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

/// Append-only ring of run-log entries, oldest evicted first.
pub struct RunLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl RunLog {
    pub fn new(capacity: usize) -> Self {
        RunLog {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends an entry and returns a copy of it (for store mirroring).
    pub fn push(&self, level: LogLevel, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level,
            message: message.into(),
        };
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        entry
    }

    /// The most recent `limit` entries, oldest first.
    pub fn tail(&self, limit: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Drops everything but the most recent `keep_recent` entries.
    pub fn clear_old(&self, keep_recent: usize) {
        let mut entries = self.entries.lock().unwrap();
        while entries.len() > keep_recent {
            entries.pop_front();
        }
    }
}

impl Default for RunLog {
    fn default() -> Self {
        RunLog::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_evicts_oldest() {
        let log = RunLog::new(3);
        for i in 0..5 {
            log.push(LogLevel::Info, format!("m{}", i));
        }
        let messages: Vec<_> = log.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_tail_returns_most_recent() {
        let log = RunLog::new(10);
        for i in 0..4 {
            log.push(LogLevel::Info, format!("m{}", i));
        }
        let tail: Vec<_> = log.tail(2).into_iter().map(|e| e.message).collect();
        assert_eq!(tail, vec!["m2", "m3"]);
    }

    #[test]
    fn test_clear_old() {
        let log = RunLog::new(10);
        for i in 0..6 {
            log.push(LogLevel::Info, format!("m{}", i));
        }
        log.clear_old(2);
        assert_eq!(log.snapshot().len(), 2);
    }
}
