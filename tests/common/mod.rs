//! Common test infrastructure
//!
//! Builds synthetic urlwatch cache databases, one per known layout, inside
//! temporary directories. Tests should only import from this module.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{create_guid_cache, GuidRow, JOB_1_URL};
//!
//! #[test]
//! fn test_reconcile_guid_cache() {
//!     let (_dir, db_path) = create_guid_cache(&[GuidRow::fetched(JOB_1_URL, 100)]).unwrap();
//!     let reconciliation = urlwatch_report::reconcile(&db_path, &[]).unwrap();
//!     assert_eq!(reconciliation.entries.len(), 1);
//! }
//! ```

mod constants;
mod fixtures;

pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::*;
