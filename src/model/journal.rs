//! Journal entries: what was decided for a VIOS, in order.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A single journal line, serialized as one line of JSONL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub vios: String,
    pub level: Level,
    pub message: String,
    pub recorded_at: Timestamp,
}

/// Severity of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Error,
}
