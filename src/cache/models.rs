//! Records read from the watcher cache and the normalized view built from them.

use crate::jobs::JobDescriptor;
use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of identifier characters kept when an identifier has no known job.
pub const DISPLAY_IDENTIFIER_CHARS: usize = 16;

/// Attempts kept on each entry, newest first.
pub const RECENT_ATTEMPTS: usize = 5;

/// One row of the foreign cache table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub identifier: String,
    /// SQLite rowid, used as insertion order.
    pub rowid: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub tries: Option<i64>,
    /// `None` when the layout has no data column.
    pub has_data: Option<bool>,
    pub data_len: Option<usize>,
    pub etag: Option<String>,
    /// Name carried by a structured job descriptor, when the identifier was one.
    pub embedded_name: Option<String>,
}

impl CacheRecord {
    pub fn new(identifier: impl Into<String>, rowid: i64) -> Self {
        CacheRecord {
            identifier: identifier.into(),
            rowid,
            timestamp: None,
            tries: None,
            has_data: None,
            data_len: None,
            etag: None,
            embedded_name: None,
        }
    }

    /// Whether this record holds fetched content. Layouts without a data column
    /// only record content-bearing rows.
    pub fn carries_content(&self) -> bool {
        self.has_data != Some(false)
    }

    pub fn is_success(&self) -> bool {
        self.carries_content() && self.tries.unwrap_or(0) == 0
    }

    /// Ordering key for "most recent": timestamp first, then insertion order.
    pub(crate) fn recency(&self) -> (Option<DateTime<Utc>>, i64) {
        (self.timestamp, self.rowid)
    }
}

/// Converts a stored timestamp to a UTC instant.
///
/// Integers and reals are Unix seconds, text may hold either a number or an
/// RFC 3339 date. Anything else, and non-positive or out of range values,
/// is treated as absent.
pub fn parse_timestamp(value: ValueRef<'_>) -> Option<DateTime<Utc>> {
    let seconds = match value {
        ValueRef::Integer(i) => i,
        ValueRef::Real(f) if f.is_finite() => f.trunc() as i64,
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).ok()?.trim();
            if let Ok(i) = text.parse::<i64>() {
                i
            } else if let Ok(f) = text.parse::<f64>() {
                if !f.is_finite() {
                    return None;
                }
                f.trunc() as i64
            } else {
                return DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc));
            }
        }
        _ => return None,
    };
    if seconds <= 0 {
        return None;
    }
    DateTime::from_timestamp(seconds, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// The latest attempt fetched content without retries.
    Successful,
    /// The latest attempt failed or is being retried.
    Failing,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Successful => "successful",
            EntryStatus::Failing => "failing",
        }
    }
}

/// One fetch attempt as shown in the recent attempt list of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub timestamp: Option<DateTime<Utc>>,
    pub tries: i64,
    pub has_content: bool,
}

impl From<&CacheRecord> for Attempt {
    fn from(record: &CacheRecord) -> Self {
        Attempt {
            timestamp: record.timestamp,
            tries: record.tries.unwrap_or(0),
            has_content: record.carries_content(),
        }
    }
}

impl Attempt {
    pub fn status_str(&self) -> &'static str {
        if self.has_content {
            "OK"
        } else {
            "ERROR"
        }
    }
}

/// Where an entry's display name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// Matched a configured job by URL or by hashed URL.
    Configured,
    /// Taken from the job descriptor stored in the cache.
    Descriptor,
    /// No job matched; the display name is the truncated identifier.
    Unknown,
}

/// The reconciled state of one cache identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEntry {
    pub identifier: String,
    pub display_name: String,
    pub url: Option<String>,
    pub label: Label,
    /// Time of the most recent attempt.
    pub last_seen: Option<DateTime<Utc>>,
    /// Time of the most recent attempt that carried content.
    pub last_change: Option<DateTime<Utc>>,
    pub status: EntryStatus,
    /// Retry counter of the most recent attempt.
    pub tries: i64,
    pub record_count: usize,
    /// Up to `RECENT_ATTEMPTS` attempts, most recent first.
    pub recent_attempts: Vec<Attempt>,
    pub data_size: Option<usize>,
    pub etag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheState {
    /// The cache database does not exist yet.
    NotInitialized,
    Ready { variant: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub db_path: PathBuf,
    pub state: CacheState,
    /// One entry per cache identifier, most recent activity first.
    pub entries: Vec<NormalizedEntry>,
    /// Configured jobs no cache identifier matched.
    pub unseen_jobs: Vec<JobDescriptor>,
}

impl Reconciliation {
    pub fn not_initialized(db_path: PathBuf, jobs: &[JobDescriptor]) -> Self {
        Reconciliation {
            db_path,
            state: CacheState::NotInitialized,
            entries: Vec::new(),
            unseen_jobs: jobs.to_vec(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, CacheState::NotInitialized)
    }
}

/// Shortens an identifier for display, on a character boundary.
pub fn truncate_identifier(identifier: &str) -> String {
    if identifier.chars().count() <= DISPLAY_IDENTIFIER_CHARS {
        identifier.to_string()
    } else {
        let head: String = identifier.chars().take(DISPLAY_IDENTIFIER_CHARS).collect();
        format!("{}...", head)
    }
}
