//! Session log stream consumed by the presentation layer.
//!
//! Every configuration or action outcome becomes a [`LogEntry`] tagged with a
//! [`Severity`]. Entries are broadcast to live subscribers and retained in a
//! bounded history (newest first) so a late subscriber can backfill.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the broadcast channel. Slow subscribers lag rather than block.
const BROADCAST_CAPACITY: usize = 256;

/// Presentation severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Failure,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single session log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub severity: Severity,
    /// Wall-clock time the entry was recorded (epoch ms).
    pub at_ms: u64,
}

/// Bounded, broadcasting session log.
#[derive(Debug)]
pub struct EventLog {
    history: Mutex<VecDeque<LogEntry>>,
    limit: usize,
    tx: broadcast::Sender<LogEntry>,
}

impl EventLog {
    /// Create a log that retains at most `limit` entries (minimum 1).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let limit = limit.max(1);
        Self {
            history: Mutex::new(VecDeque::with_capacity(limit)),
            limit,
            tx,
        }
    }

    /// Record an entry, mirror it to tracing, and broadcast it.
    pub fn push(&self, message: impl Into<String>, severity: Severity, at_ms: u64) {
        let entry = LogEntry {
            message: message.into(),
            severity,
            at_ms,
        };

        match severity {
            Severity::Failure => tracing::warn!(severity = %severity, "{}", entry.message),
            Severity::Info | Severity::Success => {
                tracing::info!(severity = %severity, "{}", entry.message);
            }
        }

        {
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            history.push_front(entry.clone());
            history.truncate(self.limit);
        }

        // No subscribers is fine: the history still has the entry.
        let _ = self.tx.send(entry);
    }

    /// Subscribe to entries recorded from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    /// Retained entries, newest first.
    #[must_use]
    pub fn recent(&self) -> Vec<LogEntry> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().cloned().collect()
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_newest_first() {
        let log = EventLog::new(10);
        log.push("first", Severity::Info, 1);
        log.push("second", Severity::Success, 2);
        let recent = log.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "second");
        assert_eq!(recent[1].message, "first");
    }

    #[test]
    fn history_is_bounded() {
        let log = EventLog::new(3);
        for i in 0..10 {
            log.push(format!("entry {i}"), Severity::Info, i);
        }
        let recent = log.recent();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].message, "entry 9");
        assert_eq!(recent[2].message, "entry 7");
    }

    #[test]
    fn zero_limit_keeps_one() {
        let log = EventLog::new(0);
        log.push("a", Severity::Info, 0);
        log.push("b", Severity::Info, 0);
        assert_eq!(log.limit(), 1);
        assert_eq!(log.recent().len(), 1);
    }

    #[test]
    fn subscribers_receive_entries() {
        let log = EventLog::new(5);
        let mut rx = log.subscribe();
        log.push("Server Response: SUCCESS - ok", Severity::Success, 42);
        let entry = rx.try_recv().expect("entry");
        assert_eq!(entry.severity, Severity::Success);
        assert_eq!(entry.at_ms, 42);
    }

    #[test]
    fn severity_serializes_snake_case() {
        let json = serde_json::to_string(&Severity::Failure).unwrap();
        assert_eq!(json, "\"failure\"");
        assert_eq!(Severity::Success.to_string(), "success");
    }
}
