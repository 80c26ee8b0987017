//! Known layouts of the watcher cache database.
//!
//! Each variant checks the introspected layout for the columns it needs and,
//! on a match, extracts rows as [`CacheRecord`]s. Variants are tried in order
//! and the first match wins.

use super::models::{parse_timestamp, CacheRecord};
use crate::jobs::DescriptorFields;
use crate::sqlite_persistence::{quote_identifier, DatabaseLayout, TableLayout};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use tracing::{debug, warn};

/// Columns of one table, as stored, that a variant reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub table: String,
    pub identifier: String,
    pub timestamp: Option<String>,
    pub tries: Option<String>,
    pub data: Option<String>,
    pub etag: Option<String>,
}

impl ColumnMapping {
    fn from_table(table: &TableLayout, identifier: &str, timestamp: &str) -> Option<Self> {
        Some(ColumnMapping {
            table: table.name.clone(),
            identifier: table.column(identifier)?.to_string(),
            timestamp: table.column(timestamp).map(str::to_string),
            tries: table.column("tries").map(str::to_string),
            data: table.column("data").map(str::to_string),
            etag: table.column("etag").map(str::to_string),
        })
    }

    fn select_sql(&self) -> String {
        let optional = |column: &Option<String>| {
            column
                .as_deref()
                .map(quote_identifier)
                .unwrap_or_else(|| "NULL".to_string())
        };
        let (has_data, data_len) = match &self.data {
            Some(data) => {
                let data = quote_identifier(data);
                (
                    format!("{} IS NOT NULL", data),
                    format!("length({})", data),
                )
            }
            None => ("NULL".to_string(), "NULL".to_string()),
        };
        format!(
            "SELECT rowid, {}, {}, {}, {}, {}, {} FROM {}",
            quote_identifier(&self.identifier),
            optional(&self.timestamp),
            optional(&self.tries),
            has_data,
            data_len,
            optional(&self.etag),
            quote_identifier(&self.table),
        )
    }
}

fn value_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Null => None,
    }
}

fn value_to_i64(value: ValueRef<'_>) -> Option<i64> {
    match value {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
        _ => None,
    }
}

/// Reads every row of the mapped table. Rows with a null identifier are skipped.
pub fn read_records(
    conn: &Connection,
    mapping: &ColumnMapping,
) -> rusqlite::Result<Vec<CacheRecord>> {
    let mut stmt = conn.prepare(&mapping.select_sql())?;
    let mut rows = stmt.query(params![])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let rowid: i64 = row.get(0)?;
        let Some(identifier) = value_to_string(row.get_ref(1)?) else {
            debug!("Skipping row {} of {} with no identifier", rowid, mapping.table);
            continue;
        };
        let mut record = CacheRecord::new(identifier, rowid);
        record.timestamp = parse_timestamp(row.get_ref(2)?);
        record.tries = value_to_i64(row.get_ref(3)?);
        record.has_data = value_to_i64(row.get_ref(4)?).map(|flag| flag != 0);
        record.data_len = value_to_i64(row.get_ref(5)?).map(|len| len.max(0) as usize);
        record.etag = value_to_string(row.get_ref(6)?);
        records.push(record);
    }
    Ok(records)
}

/// A known cache layout.
pub trait SchemaVariant {
    fn name(&self) -> &'static str;

    /// Returns the columns to read when the database matches this layout.
    fn detect(&self, layout: &DatabaseLayout) -> Option<ColumnMapping>;

    fn extract(
        &self,
        conn: &Connection,
        mapping: &ColumnMapping,
    ) -> rusqlite::Result<Vec<CacheRecord>> {
        read_records(conn, mapping)
    }
}

/// `CacheEntry(guid, timestamp, tries, data, etag)`: identifiers are hashed URLs.
pub struct GuidCacheEntry;

impl SchemaVariant for GuidCacheEntry {
    fn name(&self) -> &'static str {
        "guid_cache_entry"
    }

    fn detect(&self, layout: &DatabaseLayout) -> Option<ColumnMapping> {
        let table = layout.table("CacheEntry")?;
        if !["timestamp", "tries", "data"]
            .iter()
            .all(|column| table.has_column(column))
        {
            return None;
        }
        ColumnMapping::from_table(table, "guid", "timestamp")
    }
}

/// `CacheEntry(key, ...)` where every column but `key` is optional.
pub struct KeyedCacheEntry;

impl SchemaVariant for KeyedCacheEntry {
    fn name(&self) -> &'static str {
        "keyed_cache_entry"
    }

    fn detect(&self, layout: &DatabaseLayout) -> Option<ColumnMapping> {
        ColumnMapping::from_table(layout.table("CacheEntry")?, "key", "timestamp")
    }
}

/// Any table with `url` and `timestamp` columns, as written by the oldest releases.
pub struct LegacyUrlTable;

impl SchemaVariant for LegacyUrlTable {
    fn name(&self) -> &'static str {
        "legacy_url_table"
    }

    fn detect(&self, layout: &DatabaseLayout) -> Option<ColumnMapping> {
        layout
            .tables
            .iter()
            .filter(|table| table.has_column("timestamp"))
            .find_map(|table| ColumnMapping::from_table(table, "url", "timestamp"))
    }
}

/// `job_state(job, last_changed)`: identifiers are serialized job descriptors.
pub struct JobStateTable;

impl SchemaVariant for JobStateTable {
    fn name(&self) -> &'static str {
        "job_state"
    }

    fn detect(&self, layout: &DatabaseLayout) -> Option<ColumnMapping> {
        let table = layout.table("job_state")?;
        if !table.has_column("last_changed") {
            return None;
        }
        ColumnMapping::from_table(table, "job", "last_changed")
    }

    fn extract(
        &self,
        conn: &Connection,
        mapping: &ColumnMapping,
    ) -> rusqlite::Result<Vec<CacheRecord>> {
        let mut records = read_records(conn, mapping)?;
        for record in &mut records {
            match DescriptorFields::parse(&record.identifier) {
                Some(DescriptorFields {
                    url: Some(url),
                    name,
                }) => {
                    record.identifier = url;
                    record.embedded_name = name;
                }
                _ => warn!(
                    "Job descriptor in row {} is not a mapping with a url, keeping it as raw identifier",
                    record.rowid
                ),
            }
        }
        Ok(records)
    }
}

/// All known variants, most specific first.
pub fn known_variants() -> Vec<Box<dyn SchemaVariant>> {
    vec![
        Box::new(GuidCacheEntry),
        Box::new(KeyedCacheEntry),
        Box::new(LegacyUrlTable),
        Box::new(JobStateTable),
    ]
}

pub fn detect_variant<'a>(
    variants: &'a [Box<dyn SchemaVariant>],
    layout: &DatabaseLayout,
) -> Option<(&'a dyn SchemaVariant, ColumnMapping)> {
    variants.iter().find_map(|variant| {
        variant
            .detect(layout)
            .map(|mapping| (variant.as_ref(), mapping))
    })
}
