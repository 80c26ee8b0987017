//! Read-only access to the watcher cache database.
//!
//! The cache layout changed between watcher releases. [`Reconciler`] detects
//! which layout a database uses and turns its rows into one
//! [`NormalizedEntry`] per identifier.

pub mod error;
pub mod models;
pub mod reconciler;
pub mod stats;
pub mod variants;

pub use error::ReconcileError;
pub use models::{
    Attempt, CacheRecord, CacheState, EntryStatus, Label, NormalizedEntry, Reconciliation,
};
pub use reconciler::{inspect, reconcile, Reconciler};
pub use stats::CacheStats;
pub use variants::{known_variants, ColumnMapping, SchemaVariant};
