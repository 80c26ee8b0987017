//! urlwatch-report
//!
//! Reads the cache database of the urlwatch page monitor, whatever schema
//! generation wrote it, and reports when each monitored page last changed.

pub mod cache;
pub mod cli_style;
pub mod config;
pub mod history;
pub mod jobs;
pub mod logs;
pub mod report;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use cache::{reconcile, CacheState, NormalizedEntry, ReconcileError, Reconciler, Reconciliation};
pub use history::ChangeHistory;
pub use jobs::{load_jobs, IdentifierScheme, JobDescriptor};
pub use report::{Report, ReportFormat};
