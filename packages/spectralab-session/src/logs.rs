use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{EventLogEntry, LogLevel};

/// Prefixed opaque identifier for log and measurement entries.
pub fn create_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

/// Short random suffix id for trace memories.
pub fn create_short_id(prefix: &str) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &simple[..8])
}

pub fn event_entry(
    level: LogLevel,
    source: &str,
    message: impl Into<String>,
    detail: Option<String>,
) -> EventLogEntry {
    event_entry_at(level, source, message, detail, Utc::now())
}

pub fn event_entry_at(
    level: LogLevel,
    source: &str,
    message: impl Into<String>,
    detail: Option<String>,
    timestamp: DateTime<Utc>,
) -> EventLogEntry {
    EventLogEntry {
        id: create_id("log"),
        timestamp,
        level,
        source: source.to_string(),
        message: message.into(),
        detail,
    }
}
