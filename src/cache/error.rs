use crate::sqlite_persistence::DatabaseLayout;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a reconciliation. A missing database is not one of them.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to access cache database {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache database path {0:?} is not a file")]
    NotAFile(PathBuf),

    #[error("Failed to open cache database {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to read cache database {path:?}: {source}")]
    Query {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Unrecognized cache schema in {path:?}, tables found: {layout}")]
    UnrecognizedSchema { path: PathBuf, layout: DatabaseLayout },
}

impl ReconcileError {
    /// Names of the tables found, for an unrecognized schema.
    pub fn found_tables(&self) -> Option<Vec<&str>> {
        match self {
            ReconcileError::UnrecognizedSchema { layout, .. } => Some(layout.table_names()),
            _ => None,
        }
    }
}
