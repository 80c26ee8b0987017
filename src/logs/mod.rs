//! Activity found in the watcher's run logs.
//!
//! Each run of the watcher may be captured to `logs/urlwatch_<YYYYMMDD_HHMMSS>.txt`.
//! A job counts as checked in a file when the file holds its `Processing:`
//! line, and as failed when any `ERROR:` line of the same file names it.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// How many of the newest log files are analyzed.
pub const DEFAULT_LOG_FILES: usize = 5;

const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Failed to list log directory {path:?}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid log pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogCheck {
    pub timestamp: DateTime<Utc>,
    pub ok: bool,
}

/// What the analyzed logs say about one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteActivity {
    pub name: String,
    pub total_checks: usize,
    pub error_count: usize,
    pub last_successful_check: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    /// Newest log file first.
    pub recent_status: Vec<LogCheck>,
}

impl SiteActivity {
    fn new(name: &str) -> Self {
        SiteActivity {
            name: name.to_string(),
            total_checks: 0,
            error_count: 0,
            last_successful_check: None,
            last_error: None,
            recent_status: Vec::new(),
        }
    }

    fn record(&mut self, timestamp: DateTime<Utc>, ok: bool) {
        self.total_checks += 1;
        let last = if ok {
            &mut self.last_successful_check
        } else {
            self.error_count += 1;
            &mut self.last_error
        };
        *last = (*last).max(Some(timestamp));
        self.recent_status.push(LogCheck { timestamp, ok });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogActivity {
    pub files_analyzed: usize,
    /// Keyed by job URL.
    pub sites: BTreeMap<String, SiteActivity>,
}

impl LogActivity {
    pub fn site(&self, url: &str) -> Option<&SiteActivity> {
        self.sites.get(url)
    }
}

pub struct LogAnalyzer {
    log_file: Regex,
    file_stamp: Regex,
    processing: Regex,
}

impl LogAnalyzer {
    pub fn new() -> Result<Self, LogError> {
        Ok(LogAnalyzer {
            log_file: Regex::new(r"^urlwatch_.*\.txt$")?,
            file_stamp: Regex::new(r"^urlwatch_(\d{8}_\d{6})\.txt$")?,
            processing: Regex::new(
                r"handler INFO: Processing: <url url='([^']+)'[^>]*name='([^']+)'",
            )?,
        })
    }

    /// Log files in `dir`, newest name first. A missing directory has none.
    pub fn log_files(&self, dir: &Path) -> Result<Vec<PathBuf>, LogError> {
        let read_dir = match std::fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Log directory {:?} does not exist", dir);
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(LogError::ListDir {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut files = Vec::new();
        for dir_entry in read_dir {
            let path = dir_entry
                .map_err(|source| LogError::ListDir {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();
            let is_log = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| self.log_file.is_match(name));
            if is_log && path.is_file() {
                files.push(path);
            }
        }
        files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(files)
    }

    /// When the run logged in `path` happened: the stamp in the file name, else
    /// the modification time.
    fn file_timestamp(&self, path: &Path) -> Option<DateTime<Utc>> {
        let from_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| self.file_stamp.captures(name))
            .and_then(|captures| {
                NaiveDateTime::parse_from_str(&captures[1], FILE_STAMP_FORMAT).ok()
            })
            .map(|naive| naive.and_utc());
        from_name.or_else(|| {
            std::fs::metadata(path)
                .and_then(|metadata| metadata.modified())
                .ok()
                .map(DateTime::<Utc>::from)
        })
    }

    /// Adds the checks logged in one file to `activity`.
    pub fn analyze_content(
        &self,
        content: &str,
        timestamp: DateTime<Utc>,
        activity: &mut LogActivity,
    ) -> Result<(), LogError> {
        for captures in self.processing.captures_iter(content) {
            let url = &captures[1];
            let name = &captures[2];
            let error = Regex::new(&format!("ERROR:.*{}", regex::escape(name)))?;
            let ok = !error.is_match(content);
            activity
                .sites
                .entry(url.to_string())
                .or_insert_with(|| SiteActivity::new(name))
                .record(timestamp, ok);
        }
        Ok(())
    }

    /// Analyzes the newest `max_files` log files of `dir`. Unreadable files
    /// are skipped.
    pub fn analyze_dir(&self, dir: &Path, max_files: usize) -> Result<LogActivity, LogError> {
        let mut activity = LogActivity::default();
        for path in self.log_files(dir)?.into_iter().take(max_files) {
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping log file {:?}: {}", path, e);
                    continue;
                }
            };
            let Some(timestamp) = self.file_timestamp(&path) else {
                warn!("Skipping log file {:?}: no timestamp", path);
                continue;
            };
            self.analyze_content(&content, timestamp, &mut activity)?;
            activity.files_analyzed += 1;
        }
        info!(
            "Analyzed {} log files in {:?}, {} sites found",
            activity.files_analyzed,
            dir,
            activity.sites.len()
        );
        Ok(activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    const RUN: &str = "\
2024-01-05 10:00:00,001 urlwatch.handler INFO: Processing: <url url='https://a.example/' max_tries=3 name='Site A'>
2024-01-05 10:00:00,002 urlwatch.handler INFO: Processing: <url url='https://b.example/' name='Site B'>
2024-01-05 10:00:03,120 urlwatch.worker ERROR: Error while executing job Site B: timed out
";

    #[test]
    fn test_analyze_content_marks_errors_by_name() {
        let analyzer = LogAnalyzer::new().unwrap();
        let mut activity = LogActivity::default();
        analyzer
            .analyze_content(RUN, at(1_704_448_800), &mut activity)
            .unwrap();

        let a = activity.site("https://a.example/").unwrap();
        assert_eq!(a.name, "Site A");
        assert_eq!((a.total_checks, a.error_count), (1, 0));
        assert_eq!(a.last_successful_check, Some(at(1_704_448_800)));
        assert_eq!(a.last_error, None);

        let b = activity.site("https://b.example/").unwrap();
        assert_eq!((b.total_checks, b.error_count), (1, 1));
        assert_eq!(b.last_error, Some(at(1_704_448_800)));
        assert!(!b.recent_status[0].ok);
    }

    #[test]
    fn test_names_are_matched_literally() {
        let analyzer = LogAnalyzer::new().unwrap();
        let mut activity = LogActivity::default();
        let content = "\
x.handler INFO: Processing: <url url='https://c.example/' name='C (v2)'>
x.worker ERROR: Error while executing job C v2
";
        analyzer
            .analyze_content(content, at(1), &mut activity)
            .unwrap();
        assert_eq!(activity.site("https://c.example/").unwrap().error_count, 0);
    }

    #[test]
    fn test_last_times_keep_the_newest() {
        let mut site = SiteActivity::new("A");
        site.record(at(300), true);
        site.record(at(100), true);
        site.record(at(200), false);
        assert_eq!(site.last_successful_check, Some(at(300)));
        assert_eq!(site.last_error, Some(at(200)));
        assert_eq!(site.total_checks, 3);
    }

    #[test]
    fn test_file_timestamp_from_name() {
        let analyzer = LogAnalyzer::new().unwrap();
        let stamp = analyzer.file_timestamp(Path::new("logs/urlwatch_20240105_100000.txt"));
        assert_eq!(stamp, Some(at(1_704_448_800)));
    }
}
