//! Per-controller command history for diagnostics.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Direction of a recorded link exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// A command pushed to the bulb.
    Send,
    /// A state read from the bulb.
    Receive,
}

/// A recorded link exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub direction: Direction,
    pub method: String,
    pub message: Value,
    /// Seconds since history creation
    pub timestamp: f64,
}

/// Bounded log of what was exchanged with one bulb, plus the last failure.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    start_time: Instant,
    entries: VecDeque<HistoryEntry>,
    last_error: Option<String>,
    sent: usize,
    received: usize,
    failures: usize,
    max_entries: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHistory {
    pub const DEFAULT_MAX_ENTRIES: usize = 100;

    pub fn new() -> Self {
        Self::with_max_entries(Self::DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            start_time: Instant::now(),
            entries: VecDeque::new(),
            last_error: None,
            sent: 0,
            received: 0,
            failures: 0,
            max_entries,
        }
    }

    /// Record an exchange. Messages without a `method` member are ignored.
    pub fn record(&mut self, direction: Direction, message: &Value) {
        let Some(method) = message.get("method").and_then(|m| m.as_str()) else {
            return;
        };

        match direction {
            Direction::Send => self.sent += 1,
            Direction::Receive => self.received += 1,
        }

        self.entries.push_back(HistoryEntry {
            direction,
            method: method.to_string(),
            message: message.clone(),
            timestamp: self.start_time.elapsed().as_secs_f64(),
        });

        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn record_error(&mut self, error: &str) {
        self.failures += 1;
        self.last_error = Some(error.to_string());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_error = None;
        self.sent = 0;
        self.received = 0;
        self.failures = 0;
    }

    pub fn summary(&self) -> HistorySummary {
        HistorySummary {
            send_count: self.sent,
            receive_count: self.received,
            failure_count: self.failures,
            total_entries: self.entries.len(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Summary of command history for diagnostics.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub send_count: usize,
    pub receive_count: usize,
    pub failure_count: usize,
    pub total_entries: usize,
    pub last_error: Option<String>,
}
