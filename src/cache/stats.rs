use super::models::CacheRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Aggregate figures over every record of a cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub variant: String,
    pub total_records: usize,
    pub distinct_identifiers: usize,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    /// Number of records per retry counter; records without one count as 0.
    pub records_by_tries: BTreeMap<i64, usize>,
}

impl CacheStats {
    pub fn from_records(variant: &str, records: &[CacheRecord]) -> Self {
        let mut records_by_tries = BTreeMap::new();
        for record in records {
            *records_by_tries.entry(record.tries.unwrap_or(0)).or_insert(0) += 1;
        }
        let distinct_identifiers = records
            .iter()
            .map(|r| r.identifier.as_str())
            .collect::<HashSet<_>>()
            .len();

        CacheStats {
            variant: variant.to_string(),
            total_records: records.len(),
            distinct_identifiers,
            earliest: records.iter().filter_map(|r| r.timestamp).min(),
            latest: records.iter().filter_map(|r| r.timestamp).max(),
            records_by_tries,
        }
    }

    pub fn successful_records(&self) -> usize {
        self.records_by_tries.get(&0).copied().unwrap_or(0)
    }
}
