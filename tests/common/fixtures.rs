//! Synthetic cache databases for every known layout.
//!
//! Each `create_*` function returns the temporary directory (keep it alive for
//! the duration of the test) and the path of the database inside it.

#![allow(dead_code)]

use anyhow::Result;
use rusqlite::{params, Connection};
use std::path::PathBuf;
use tempfile::TempDir;
use urlwatch_report::sqlite_column;
use urlwatch_report::sqlite_persistence::{Column, SqlType, Table};
use urlwatch_report::IdentifierScheme;

/// Layout written by current urlwatch releases.
pub const GUID_CACHE_TABLE: Table = Table {
    name: "CacheEntry",
    columns: &[
        sqlite_column!("guid", SqlType::Text),
        sqlite_column!("timestamp", SqlType::Integer),
        sqlite_column!("data", SqlType::Text),
        sqlite_column!("tries", SqlType::Integer),
        sqlite_column!("etag", SqlType::Text),
    ],
    indices: &[("idx_guid", "guid")],
};

/// Older layout keyed by the raw URL.
pub const KEYED_CACHE_TABLE: Table = Table {
    name: "cacheentry",
    columns: &[
        sqlite_column!("KEY", SqlType::Text),
        sqlite_column!("Timestamp", SqlType::Integer),
        sqlite_column!("data", SqlType::Text),
    ],
    indices: &[],
};

pub const LEGACY_URL_TABLE: Table = Table {
    name: "watches",
    columns: &[
        sqlite_column!("url", SqlType::Text, non_null = true),
        sqlite_column!("timestamp", SqlType::Real),
        sqlite_column!("content", SqlType::Text),
    ],
    indices: &[],
};

pub const JOB_STATE_TABLE: Table = Table {
    name: "job_state",
    columns: &[
        sqlite_column!("job", SqlType::Text, is_primary_key = true),
        sqlite_column!("last_changed", SqlType::Integer),
    ],
    indices: &[],
};

pub const SETTINGS_TABLE: Table = Table {
    name: "settings",
    columns: &[
        sqlite_column!("name", SqlType::Text, is_primary_key = true),
        sqlite_column!("value", SqlType::Text),
    ],
    indices: &[],
};

/// One fetch attempt in a `CacheEntry(guid, ...)` table.
#[derive(Debug, Clone)]
pub struct GuidRow {
    pub guid: String,
    pub timestamp: Option<i64>,
    pub tries: i64,
    pub data: Option<String>,
    pub etag: Option<String>,
}

impl GuidRow {
    /// A successful fetch of `url` at `timestamp`.
    pub fn fetched(url: &str, timestamp: i64) -> Self {
        GuidRow {
            guid: guid_for(url),
            timestamp: Some(timestamp),
            tries: 0,
            data: Some(format!("<html>{} at {}</html>", url, timestamp)),
            etag: None,
        }
    }

    /// A failed fetch of `url` at `timestamp`, after `tries` retries.
    pub fn failed(url: &str, timestamp: i64, tries: i64) -> Self {
        GuidRow {
            guid: guid_for(url),
            timestamp: Some(timestamp),
            tries,
            data: None,
            etag: None,
        }
    }
}

pub fn guid_for(url: &str) -> String {
    IdentifierScheme::Sha1.identifier_for(url)
}

/// Creates an empty database containing the given tables.
pub fn create_test_db(tables: &[&Table]) -> Result<(TempDir, PathBuf, Connection)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("cache.db");
    let conn = Connection::open(&db_path)?;
    for table in tables {
        table.create(&conn)?;
    }
    Ok((dir, db_path, conn))
}

pub fn create_guid_cache(rows: &[GuidRow]) -> Result<(TempDir, PathBuf)> {
    let (dir, db_path, conn) = create_test_db(&[&GUID_CACHE_TABLE])?;
    for row in rows {
        conn.execute(
            "INSERT INTO CacheEntry (guid, timestamp, data, tries, etag) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![row.guid, row.timestamp, row.data, row.tries, row.etag],
        )?;
    }
    Ok((dir, db_path))
}

/// Rows are `(key, timestamp, data)`.
pub fn create_keyed_cache(rows: &[(&str, Option<i64>, Option<&str>)]) -> Result<(TempDir, PathBuf)> {
    let (dir, db_path, conn) = create_test_db(&[&KEYED_CACHE_TABLE])?;
    for (key, timestamp, data) in rows {
        conn.execute(
            "INSERT INTO cacheentry (KEY, Timestamp, data) VALUES (?1, ?2, ?3)",
            params![key, timestamp, data],
        )?;
    }
    Ok((dir, db_path))
}

/// Rows are `(url, timestamp)`; the legacy table stores fractional seconds.
pub fn create_legacy_cache(rows: &[(&str, Option<f64>)]) -> Result<(TempDir, PathBuf)> {
    let (dir, db_path, conn) = create_test_db(&[&SETTINGS_TABLE, &LEGACY_URL_TABLE])?;
    for (url, timestamp) in rows {
        conn.execute(
            "INSERT INTO watches (url, timestamp, content) VALUES (?1, ?2, 'page')",
            params![url, timestamp],
        )?;
    }
    Ok((dir, db_path))
}

/// Rows are `(serialized job descriptor, last_changed)`.
pub fn create_job_state_cache(rows: &[(&str, Option<i64>)]) -> Result<(TempDir, PathBuf)> {
    let (dir, db_path, conn) = create_test_db(&[&JOB_STATE_TABLE])?;
    for (job, last_changed) in rows {
        conn.execute(
            "INSERT INTO job_state (job, last_changed) VALUES (?1, ?2)",
            params![job, last_changed],
        )?;
    }
    Ok((dir, db_path))
}

/// A file with a database name but random content.
pub fn create_corrupt_db() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("cache.db");
    let garbage: Vec<u8> = (0..4096u32).map(|i| (i * 7 + 13) as u8).collect();
    std::fs::write(&db_path, garbage)?;
    Ok((dir, db_path))
}

/// Writes a job list next to the database and returns its path.
pub fn write_jobs_file(dir: &TempDir, content: &str) -> Result<PathBuf> {
    let path = dir.path().join("urls2watch.yaml");
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Writes `logs/urlwatch_<stamp>.txt` under `dir` and returns the logs directory.
pub fn write_log_file(dir: &TempDir, stamp: &str, content: &str) -> Result<PathBuf> {
    let logs_dir = dir.path().join("logs");
    std::fs::create_dir_all(&logs_dir)?;
    std::fs::write(logs_dir.join(format!("urlwatch_{}.txt", stamp)), content)?;
    Ok(logs_dir)
}
