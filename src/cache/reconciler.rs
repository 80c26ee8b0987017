use super::error::ReconcileError;
use super::models::{
    truncate_identifier, Attempt, CacheRecord, CacheState, EntryStatus, Label, NormalizedEntry,
    Reconciliation, RECENT_ATTEMPTS,
};
use super::stats::CacheStats;
use super::variants::{detect_variant, known_variants, SchemaVariant};
use crate::jobs::{IdentifierScheme, JobDescriptor, JobIndex};
use crate::sqlite_persistence::DatabaseLayout;
use rusqlite::{Connection, OpenFlags};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Opens the cache read-only. `Ok(None)` means the file does not exist yet.
fn open_read_only(db_path: &Path) -> Result<Option<Connection>, ReconcileError> {
    match std::fs::metadata(db_path) {
        Ok(metadata) if metadata.is_dir() => {
            return Err(ReconcileError::NotAFile(db_path.to_path_buf()))
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ReconcileError::Io {
                path: db_path.to_path_buf(),
                source: e,
            })
        }
    }

    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| ReconcileError::Open {
        path: db_path.to_path_buf(),
        source,
    })?;
    Ok(Some(conn))
}

fn read_layout(conn: &Connection, db_path: &Path) -> Result<DatabaseLayout, ReconcileError> {
    DatabaseLayout::read(conn).map_err(|source| ReconcileError::Query {
        path: db_path.to_path_buf(),
        source,
    })
}

/// Lists the tables of a cache database, or `None` if it does not exist.
pub fn inspect(db_path: &Path) -> Result<Option<DatabaseLayout>, ReconcileError> {
    match open_read_only(db_path)? {
        Some(conn) => Ok(Some(read_layout(&conn, db_path)?)),
        None => Ok(None),
    }
}

/// Reconciles with the default variants and identifier scheme.
pub fn reconcile(
    db_path: &Path,
    jobs: &[JobDescriptor],
) -> Result<Reconciliation, ReconcileError> {
    Reconciler::default().reconcile(db_path, jobs)
}

/// Builds the last-change-per-job view of a watcher cache.
pub struct Reconciler {
    variants: Vec<Box<dyn SchemaVariant>>,
    scheme: IdentifierScheme,
}

impl Default for Reconciler {
    fn default() -> Self {
        Reconciler::new(IdentifierScheme::default())
    }
}

impl Reconciler {
    pub fn new(scheme: IdentifierScheme) -> Self {
        Reconciler {
            variants: known_variants(),
            scheme,
        }
    }

    /// Reads every record of the cache along with the name of the matched variant.
    /// Returns `Ok(None)` when the database does not exist.
    pub fn read_records(
        &self,
        db_path: &Path,
    ) -> Result<Option<(String, Vec<CacheRecord>)>, ReconcileError> {
        let Some(conn) = open_read_only(db_path)? else {
            return Ok(None);
        };
        let layout = read_layout(&conn, db_path)?;

        let Some((variant, mapping)) = detect_variant(&self.variants, &layout) else {
            return Err(ReconcileError::UnrecognizedSchema {
                path: db_path.to_path_buf(),
                layout,
            });
        };
        debug!(
            "Cache {:?} matches variant {} ({:?})",
            db_path,
            variant.name(),
            mapping
        );

        let records =
            variant
                .extract(&conn, &mapping)
                .map_err(|source| ReconcileError::Query {
                    path: db_path.to_path_buf(),
                    source,
                })?;
        Ok(Some((variant.name().to_string(), records)))
    }

    pub fn reconcile(
        &self,
        db_path: &Path,
        jobs: &[JobDescriptor],
    ) -> Result<Reconciliation, ReconcileError> {
        let Some((variant, records)) = self.read_records(db_path)? else {
            info!("Cache database {:?} does not exist yet", db_path);
            return Ok(Reconciliation::not_initialized(db_path.to_path_buf(), jobs));
        };

        let index = JobIndex::new(jobs, self.scheme);
        let (entries, unseen_jobs) = normalize(records, &index);
        info!(
            "Reconciled {} cache identifiers ({} variant), {} configured jobs not seen",
            entries.len(),
            variant,
            unseen_jobs.len()
        );

        Ok(Reconciliation {
            db_path: db_path.to_path_buf(),
            state: CacheState::Ready { variant },
            entries,
            unseen_jobs,
        })
    }

    pub fn stats(&self, db_path: &Path) -> Result<Option<CacheStats>, ReconcileError> {
        Ok(self
            .read_records(db_path)?
            .map(|(variant, records)| CacheStats::from_records(&variant, &records)))
    }
}

/// Groups records by identifier and resolves each group against the job index.
fn normalize(
    records: Vec<CacheRecord>,
    index: &JobIndex,
) -> (Vec<NormalizedEntry>, Vec<JobDescriptor>) {
    let mut groups: BTreeMap<String, Vec<CacheRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.identifier.clone())
            .or_default()
            .push(record);
    }

    let mut matched_jobs = HashSet::new();
    let mut entries = Vec::with_capacity(groups.len());
    for (identifier, mut group) in groups {
        // Most recent first.
        group.sort_by(|a, b| b.recency().cmp(&a.recency()));
        let Some(latest) = group.first() else {
            continue;
        };
        let last_change = group
            .iter()
            .find(|r| r.carries_content())
            .and_then(|r| r.timestamp);
        let embedded_name = group.iter().find_map(|r| r.embedded_name.clone());
        let recent_attempts: Vec<Attempt> =
            group.iter().take(RECENT_ATTEMPTS).map(Attempt::from).collect();

        let (display_name, url, label) = match index.resolve(&identifier) {
            Some(job_match) => {
                matched_jobs.insert(job_match.position);
                (
                    job_match.job.name.clone(),
                    Some(job_match.job.url.clone()),
                    Label::Configured,
                )
            }
            None => {
                let url = identifier.contains("://").then(|| identifier.clone());
                match embedded_name {
                    Some(name) => (name, url, Label::Descriptor),
                    None => (
                        format!("unknown job ({})", truncate_identifier(&identifier)),
                        url,
                        Label::Unknown,
                    ),
                }
            }
        };

        let status = if latest.is_success() {
            EntryStatus::Successful
        } else {
            EntryStatus::Failing
        };

        entries.push(NormalizedEntry {
            display_name,
            url,
            label,
            last_seen: latest.timestamp,
            last_change,
            status,
            tries: latest.tries.unwrap_or(0),
            record_count: group.len(),
            recent_attempts,
            data_size: latest.data_len,
            etag: latest.etag.clone(),
            identifier,
        });
    }

    // Most recent first, entries without a timestamp last, ties by identifier.
    entries.sort_by(|a, b| {
        b.last_seen
            .cmp(&a.last_seen)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });

    let unseen_jobs = index
        .jobs()
        .iter()
        .enumerate()
        .filter(|(position, _)| !matched_jobs.contains(position))
        .map(|(_, job)| job.clone())
        .collect();

    (entries, unseen_jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn record(identifier: &str, rowid: i64, ts: Option<i64>) -> CacheRecord {
        let mut record = CacheRecord::new(identifier, rowid);
        record.timestamp = ts.and_then(|s| DateTime::from_timestamp(s, 0));
        record
    }

    #[test]
    fn test_normalize_picks_latest_and_last_content() {
        let mut failed = record("g", 3, Some(300));
        failed.has_data = Some(false);
        failed.tries = Some(2);
        let mut ok = record("g", 1, Some(200));
        ok.has_data = Some(true);
        ok.tries = Some(0);

        let (entries, _) = normalize(vec![ok, failed], &JobIndex::default());
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.last_seen, DateTime::from_timestamp(300, 0));
        assert_eq!(entry.last_change, DateTime::from_timestamp(200, 0));
        assert_eq!(entry.status, EntryStatus::Failing);
        assert_eq!(entry.tries, 2);
        assert_eq!(entry.record_count, 2);
    }

    #[test]
    fn test_normalize_keeps_recent_attempts_newest_first() {
        let mut records: Vec<CacheRecord> = (1..=7)
            .map(|i| {
                let mut r = record("g", i, Some(i * 100));
                r.has_data = Some(i % 2 == 1);
                r.tries = Some(if i % 2 == 1 { 0 } else { 1 });
                r
            })
            .collect();
        records.reverse();
        records.swap(0, 3);

        let (entries, _) = normalize(records, &JobIndex::default());
        let attempts = &entries[0].recent_attempts;
        assert_eq!(entries[0].record_count, 7);
        assert_eq!(attempts.len(), RECENT_ATTEMPTS);
        let times: Vec<Option<DateTime<chrono::Utc>>> =
            attempts.iter().map(|a| a.timestamp).collect();
        let expected: Vec<_> = [700, 600, 500, 400, 300]
            .iter()
            .map(|s| DateTime::from_timestamp(*s, 0))
            .collect();
        assert_eq!(times, expected);
        assert!(attempts[0].has_content);
        assert!(!attempts[1].has_content);
        assert_eq!(attempts[1].tries, 1);
    }

    #[test]
    fn test_normalize_insertion_order_without_timestamps() {
        let mut first = record("k", 1, None);
        first.tries = Some(1);
        let second = record("k", 2, None);

        let (entries, _) = normalize(vec![second, first], &JobIndex::default());
        assert_eq!(entries[0].tries, 0);
        assert_eq!(entries[0].status, EntryStatus::Successful);
    }

    #[test]
    fn test_normalize_sorting() {
        let records = vec![
            record("b", 1, None),
            record("a", 2, None),
            record("z", 3, Some(100)),
            record("y", 4, Some(100)),
            record("x", 5, Some(50)),
        ];
        let (entries, _) = normalize(records, &JobIndex::default());
        let order: Vec<&str> = entries.iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(order, vec!["y", "z", "x", "a", "b"]);
    }

    #[test]
    fn test_normalize_labels_and_unseen_jobs() {
        let jobs = vec![
            JobDescriptor::new("By URL", "https://url.example/"),
            JobDescriptor::new("By hash", "https://hash.example/"),
            JobDescriptor::new("Never seen", "https://never.example/"),
        ];
        let index = JobIndex::new(&jobs, IdentifierScheme::Sha1);
        let hashed = IdentifierScheme::Sha1.identifier_for("https://hash.example/");
        let mut described = record("https://described.example/", 4, Some(1));
        described.embedded_name = Some("From descriptor".to_string());

        let records = vec![
            record("https://url.example/", 1, Some(4)),
            record(&hashed, 2, Some(3)),
            record("0123456789abcdef0123", 3, Some(2)),
            described,
        ];
        let (entries, unseen) = normalize(records, &index);

        assert_eq!(entries[0].display_name, "By URL");
        assert_eq!(entries[0].label, Label::Configured);
        assert_eq!(entries[1].display_name, "By hash");
        assert_eq!(entries[1].url.as_deref(), Some("https://hash.example/"));
        assert_eq!(entries[2].label, Label::Unknown);
        assert_eq!(entries[2].display_name, "unknown job (0123456789abcdef...)");
        assert_eq!(entries[2].url, None);
        assert_eq!(entries[3].label, Label::Descriptor);
        assert_eq!(entries[3].display_name, "From descriptor");
        assert_eq!(entries[3].url.as_deref(), Some("https://described.example/"));

        assert_eq!(unseen, vec![JobDescriptor::new("Never seen", "https://never.example/")]);
    }
}
