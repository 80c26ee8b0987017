use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use urlwatch_report::cache::variants::detect_variant;
use urlwatch_report::cache::{inspect, known_variants, CacheStats, Reconciler};
use urlwatch_report::cli_style::{
    get_styles, print_error, print_key_value, print_section_footer, print_section_header,
    print_success, print_warning, TableBuilder,
};
use urlwatch_report::config::default_db_path;
use urlwatch_report::report::format_time;

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(
    name = "cache-inspect",
    about = "Show the tables, detected layout and statistics of a urlwatch cache database",
    styles = get_styles(),
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")")
)]
struct CliArgs {
    /// Path to the cache database. Defaults to $URLWATCH_CACHE_DB or the
    /// platform cache directory.
    #[clap(value_parser = parse_path)]
    pub path: Option<PathBuf>,
}

fn print_stats(stats: &CacheStats) {
    print_section_header("Statistics");
    print_key_value("Total records", &stats.total_records.to_string());
    print_key_value(
        "Distinct identifiers",
        &stats.distinct_identifiers.to_string(),
    );
    print_key_value("Earliest record", &format_time(stats.earliest));
    print_key_value("Latest record", &format_time(stats.latest));
    print_key_value(
        "Successful records",
        &stats.successful_records().to_string(),
    );
    for (tries, count) in &stats.records_by_tries {
        print_key_value(&format!("tries={}", tries), &count.to_string());
    }
    print_section_footer();
}

/// Prints the layout of the database at `db_path`. Fails when no known
/// layout matches.
fn run(db_path: &Path) -> Result<()> {
    print_section_header("Cache Database");
    print_key_value("Path", &db_path.display().to_string());

    let Some(layout) = inspect(db_path)? else {
        print_warning("The cache database does not exist yet");
        print_section_footer();
        return Ok(());
    };
    if let Ok(metadata) = std::fs::metadata(db_path) {
        print_key_value("Size", &format!("{} bytes", metadata.len()));
    }
    print_key_value("Tables", &layout.tables.len().to_string());
    print_section_footer();

    for table in &layout.tables {
        print_section_header(&format!("{} ({} rows)", table.name, table.row_count));
        let mut columns = TableBuilder::new(&["Column", "Type", "Key", "Not null"]);
        for column in &table.columns {
            columns.add_row(vec![
                column.name.clone(),
                column.declared_type.clone(),
                if column.is_primary_key { "PK" } else { "" }.to_string(),
                if column.non_null { "yes" } else { "" }.to_string(),
            ]);
        }
        columns.print();
        print_section_footer();
    }

    let variants = known_variants();
    let Some((variant, mapping)) = detect_variant(&variants, &layout) else {
        print_error("None of the known cache layouts matches this database");
        bail!("Unrecognized cache layout in {:?}: {}", db_path, layout);
    };
    print_success(&format!(
        "Detected layout {} (table {}, identifier column {})",
        variant.name(),
        mapping.table,
        mapping.identifier
    ));

    if let Some(stats) = Reconciler::default().stats(db_path)? {
        print_stats(&stats);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let db_path = cli_args.path.unwrap_or_else(default_db_path);
    run(&db_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tempfile::TempDir;

    #[test]
    fn test_run_fails_on_unrecognized_layout() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("cache.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch("CREATE TABLE notes (body TEXT, created INTEGER);")
            .unwrap();
        drop(conn);

        let err = run(&db_path).unwrap_err();
        assert!(err.to_string().contains("notes(body, created)"), "{}", err);
    }

    #[test]
    fn test_run_accepts_known_layout_and_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(run(&dir.path().join("missing.db")).is_ok());

        let db_path = dir.path().join("cache.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE CacheEntry (guid TEXT, timestamp INT, data TEXT, tries INT, etag TEXT);
             INSERT INTO CacheEntry VALUES ('abc123', 1700000000, 'x', 0, NULL);",
        )
        .unwrap();
        drop(conn);
        assert!(run(&db_path).is_ok());
    }
}
