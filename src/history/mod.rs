//! Bounded per-identifier change log.
//!
//! The history is a plain JSON file owned by the caller: it is loaded, fed
//! reconciliations and saved explicitly. Each identifier keeps at most
//! `retention` change records, oldest dropped first.

use crate::cache::{EntryStatus, NormalizedEntry, Reconciliation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_RETENTION: usize = 50;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to read history file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("History file {path:?} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write history file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    New,
    Changed,
    Unchanged,
    Error,
}

impl ChangeKind {
    fn marks_change(&self) -> bool {
        matches!(self, ChangeKind::New | ChangeKind::Changed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: ChangeKind,
    pub content_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHistory {
    pub name: String,
    pub url: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_change: Option<DateTime<Utc>>,
    pub changes: Vec<ChangeRecord>,
}

#[derive(Serialize, Deserialize, Default)]
struct HistoryFile {
    targets: BTreeMap<String, TargetHistory>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeHistory {
    retention: usize,
    targets: BTreeMap<String, TargetHistory>,
}

impl ChangeHistory {
    /// An empty history. A retention of zero is raised to one.
    pub fn new(retention: usize) -> Self {
        ChangeHistory {
            retention: retention.max(1),
            targets: BTreeMap::new(),
        }
    }

    /// Loads a history file. A missing file yields an empty history, a
    /// malformed one is an error. Targets over the retention cap are trimmed.
    pub fn load(path: &Path, retention: usize) -> Result<Self, HistoryError> {
        let mut history = ChangeHistory::new(retention);
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No history file at {:?}, starting empty", path);
                return Ok(history);
            }
            Err(source) => {
                return Err(HistoryError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let file: HistoryFile =
            serde_json::from_str(&content).map_err(|source| HistoryError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        history.targets = file.targets;
        for target in history.targets.values_mut() {
            trim(&mut target.changes, history.retention);
        }
        Ok(history)
    }

    /// Writes the history as pretty JSON, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        let write_err = |source| HistoryError::Write {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(&HistoryFile {
            targets: self.targets.clone(),
        })?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        info!("Saved history of {} targets to {:?}", self.targets.len(), path);
        Ok(())
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn get(&self, identifier: &str) -> Option<&TargetHistory> {
        self.targets.get(identifier)
    }

    pub fn targets(&self) -> impl Iterator<Item = (&String, &TargetHistory)> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Appends a change record for an identifier, creating its history if needed.
    pub fn record(
        &mut self,
        identifier: &str,
        name: &str,
        url: Option<&str>,
        kind: ChangeKind,
        content_length: usize,
        at: DateTime<Utc>,
    ) {
        let target = self
            .targets
            .entry(identifier.to_string())
            .or_insert_with(|| TargetHistory {
                name: name.to_string(),
                url: url.map(str::to_string),
                first_seen: at,
                last_change: None,
                changes: Vec::new(),
            });
        target.name = name.to_string();
        if url.is_some() {
            target.url = url.map(str::to_string);
        }
        if kind.marks_change() && target.last_change.map_or(true, |last| at > last) {
            target.last_change = Some(at);
        }
        target.changes.push(ChangeRecord {
            timestamp: at,
            kind,
            content_length,
        });
        trim(&mut target.changes, self.retention);
    }

    /// Records what changed since the last absorbed reconciliation. Returns
    /// the number of records appended; absorbing the same view twice appends
    /// nothing the second time.
    pub fn absorb(&mut self, reconciliation: &Reconciliation, now: DateTime<Utc>) -> usize {
        let mut appended = 0;
        for entry in &reconciliation.entries {
            for (kind, at) in self.pending_records(entry, now) {
                self.record(
                    &entry.identifier,
                    &entry.display_name,
                    entry.url.as_deref(),
                    kind,
                    entry.data_size.unwrap_or(0),
                    at,
                );
                appended += 1;
            }
        }
        if appended > 0 {
            debug!("Absorbed {} history records", appended);
        }
        appended
    }

    fn pending_records(
        &self,
        entry: &NormalizedEntry,
        now: DateTime<Utc>,
    ) -> Vec<(ChangeKind, DateTime<Utc>)> {
        let failing = entry.status == EntryStatus::Failing;
        let Some(target) = self.targets.get(&entry.identifier) else {
            return match entry.last_change {
                Some(at) if !failing => vec![(ChangeKind::New, at)],
                Some(at) => vec![
                    (ChangeKind::New, at),
                    (ChangeKind::Error, entry.last_seen.unwrap_or(now)),
                ],
                None => vec![(ChangeKind::Error, entry.last_seen.unwrap_or(now))],
            };
        };

        let mut pending = Vec::new();
        if let Some(change) = entry.last_change {
            if target.last_change.map_or(true, |last| change > last) {
                pending.push((ChangeKind::Changed, change));
            }
        }
        if failing {
            let already_recorded = match target.changes.last() {
                Some(last) if last.kind == ChangeKind::Error => entry
                    .last_seen
                    .map_or(true, |seen| seen <= last.timestamp),
                _ => false,
            };
            if !already_recorded {
                pending.push((ChangeKind::Error, entry.last_seen.unwrap_or(now)));
            }
        }
        pending
    }
}

fn trim(changes: &mut Vec<ChangeRecord>, retention: usize) {
    if changes.len() > retention {
        let excess = changes.len() - retention;
        changes.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheState, Label};
    use tempfile::TempDir;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    fn entry(identifier: &str, last_change: Option<i64>, failing: bool) -> NormalizedEntry {
        NormalizedEntry {
            identifier: identifier.to_string(),
            display_name: format!("Job {}", identifier),
            url: Some(format!("https://{}.example/", identifier)),
            label: Label::Configured,
            last_seen: last_change.map(|s| at(s + 10)),
            last_change: last_change.map(at),
            status: if failing {
                EntryStatus::Failing
            } else {
                EntryStatus::Successful
            },
            tries: if failing { 1 } else { 0 },
            record_count: 1,
            recent_attempts: Vec::new(),
            data_size: Some(42),
            etag: None,
        }
    }

    fn reconciliation(entries: Vec<NormalizedEntry>) -> Reconciliation {
        Reconciliation {
            db_path: PathBuf::from("cache.db"),
            state: CacheState::Ready {
                variant: "guid_cache_entry".to_string(),
            },
            entries,
            unseen_jobs: Vec::new(),
        }
    }

    #[test]
    fn test_record_trims_to_retention() {
        let mut history = ChangeHistory::new(3);
        for i in 1..=5 {
            history.record("id", "Job", None, ChangeKind::Changed, i, at(i as i64));
        }
        let target = history.get("id").unwrap();
        assert_eq!(target.changes.len(), 3);
        assert_eq!(target.changes[0].content_length, 3);
        assert_eq!(target.first_seen, at(1));
        assert_eq!(target.last_change, Some(at(5)));
    }

    #[test]
    fn test_errors_do_not_move_last_change() {
        let mut history = ChangeHistory::new(DEFAULT_RETENTION);
        history.record("id", "Job", None, ChangeKind::New, 1, at(10));
        history.record("id", "Job", None, ChangeKind::Error, 0, at(20));
        assert_eq!(history.get("id").unwrap().last_change, Some(at(10)));
    }

    #[test]
    fn test_zero_retention_keeps_one() {
        let mut history = ChangeHistory::new(0);
        history.record("id", "Job", None, ChangeKind::New, 1, at(1));
        history.record("id", "Job", None, ChangeKind::Changed, 1, at(2));
        assert_eq!(history.retention(), 1);
        assert_eq!(history.get("id").unwrap().changes.len(), 1);
    }

    #[test]
    fn test_absorb_is_idempotent() {
        let mut history = ChangeHistory::new(DEFAULT_RETENTION);
        let view = reconciliation(vec![entry("a", Some(100), false), entry("b", Some(50), true)]);

        assert_eq!(history.absorb(&view, at(1000)), 3);
        assert_eq!(history.absorb(&view, at(2000)), 0);

        let b = history.get("b").unwrap();
        let kinds: Vec<ChangeKind> = b.changes.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::New, ChangeKind::Error]);
    }

    #[test]
    fn test_absorb_records_newer_change() {
        let mut history = ChangeHistory::new(DEFAULT_RETENTION);
        history.absorb(&reconciliation(vec![entry("a", Some(100), false)]), at(1000));
        let appended = history.absorb(&reconciliation(vec![entry("a", Some(200), false)]), at(1000));

        assert_eq!(appended, 1);
        let a = history.get("a").unwrap();
        assert_eq!(a.changes.last().unwrap().kind, ChangeKind::Changed);
        assert_eq!(a.last_change, Some(at(200)));
    }

    #[test]
    fn test_absorb_never_fetched_entry_records_error() {
        let mut history = ChangeHistory::new(DEFAULT_RETENTION);
        history.absorb(&reconciliation(vec![entry("a", None, true)]), at(1000));
        let a = history.get("a").unwrap();
        assert_eq!(a.changes[0].kind, ChangeKind::Error);
        assert_eq!(a.changes[0].timestamp, at(1000));
        assert_eq!(a.last_change, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("changes_history.json");

        let mut history = ChangeHistory::new(DEFAULT_RETENTION);
        history.record(
            "id",
            "Job",
            Some("https://a.example/"),
            ChangeKind::New,
            12,
            at(100),
        );
        history.save(&path).unwrap();

        let loaded = ChangeHistory::load(&path, DEFAULT_RETENTION).unwrap();
        assert_eq!(loaded, history);
    }

    #[test]
    fn test_load_trims_to_smaller_retention() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");

        let mut history = ChangeHistory::new(10);
        for i in 1..=10 {
            history.record("id", "Job", None, ChangeKind::Changed, 0, at(i));
        }
        history.save(&path).unwrap();

        let loaded = ChangeHistory::load(&path, 4).unwrap();
        assert_eq!(loaded.get("id").unwrap().changes.len(), 4);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let history = ChangeHistory::load(&dir.path().join("none.json"), 5).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ChangeHistory::load(&path, 5).unwrap_err();
        assert!(matches!(err, HistoryError::Malformed { .. }));
    }
}
