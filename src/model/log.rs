use std::{collections::VecDeque, fmt};

use serde::{Deserialize, Serialize};

/// Maximum number of log records kept in the ring buffer.
pub const LOG_LIMIT: usize = 200;

/// Severity of a bridge log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordLevel {
    /// Informational
    Info,
    /// Something degraded but the bridge continues
    Warn,
    /// An operation failed
    Error,
}

impl fmt::Display for RecordLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordLevel::Info => "info",
            RecordLevel::Warn => "warn",
            RecordLevel::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// One entry of the bridge log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Wall-clock time in milliseconds since the epoch.
    pub at: i64,
    /// Severity.
    pub level: RecordLevel,
    /// Human-readable message.
    pub message: String,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    pub fn now(level: RecordLevel, message: impl Into<String>) -> Self {
        Self {
            at: chrono::Utc::now().timestamp_millis(),
            level,
            message: message.into(),
        }
    }
}

/// Append-only ring buffer of the most recent [`LOG_LIMIT`] records.
///
/// The oldest record is dropped silently when the buffer is full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<LogRecord>", into = "Vec<LogRecord>")]
pub struct LogBuffer {
    records: VecDeque<LogRecord>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self {
            records: VecDeque::with_capacity(LOG_LIMIT),
        }
    }
}

impl LogBuffer {
    /// Appends a record, evicting the oldest on overflow.
    pub fn push(&mut self, record: LogRecord) {
        if self.records.len() == LOG_LIMIT {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Appends records in order.
    pub fn extend_from(&mut self, records: impl IntoIterator<Item = LogRecord>) {
        for record in records {
            self.push(record);
        }
    }

    /// Records from oldest to newest.
    pub fn records(&self) -> impl Iterator<Item = &LogRecord> {
        self.records.iter()
    }

    /// The newest `count` records, oldest first.
    pub fn tail(&self, count: usize) -> Vec<LogRecord> {
        let skip = self.records.len().saturating_sub(count);
        self.records.iter().skip(skip).cloned().collect()
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the buffer holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<LogRecord>> for LogBuffer {
    fn from(records: Vec<LogRecord>) -> Self {
        let mut buffer = Self::default();
        buffer.extend_from(records);
        buffer
    }
}

impl From<LogBuffer> for Vec<LogRecord> {
    fn from(buffer: LogBuffer) -> Self {
        buffer.records.into()
    }
}
