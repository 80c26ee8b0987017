use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use urlwatch_report::cache::{CacheStats, Reconciler};
use urlwatch_report::cli_style::get_styles;
use urlwatch_report::config::{AppConfig, CliConfig, FileConfig};
use urlwatch_report::history::ChangeHistory;
use urlwatch_report::jobs::load_jobs;
use urlwatch_report::logs::{LogAnalyzer, DEFAULT_LOG_FILES};
use urlwatch_report::report::{format_time, Report, ReportFormat};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(
    name = "urlwatch-report",
    about = "Report when each page monitored by urlwatch last changed",
    styles = get_styles(),
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")")
)]
struct CliArgs {
    /// Path to the urlwatch cache database. Defaults to $URLWATCH_CACHE_DB or
    /// the platform cache directory.
    #[clap(long, value_parser = parse_path)]
    pub db: Option<PathBuf>,

    /// YAML job list used to name cache entries.
    #[clap(long, value_parser = parse_path)]
    pub jobs: Option<PathBuf>,

    /// TOML config file. Its values override command line options.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Report format.
    #[clap(long, value_enum, default_value = "text")]
    pub format: ReportFormat,

    /// Write the report to this file instead of stdout.
    #[clap(short, long, value_parser = parse_path)]
    pub output: Option<PathBuf>,

    /// Change history file to update and use for earlier change dates.
    #[clap(long, value_parser = parse_path)]
    pub history: Option<PathBuf>,

    /// Maximum number of change records kept per page in the history.
    #[clap(long)]
    pub history_retention: Option<usize>,

    /// Scheme used to derive cache identifiers from job URLs.
    #[clap(long)]
    pub identifier_scheme: Option<String>,

    /// Directory of urlwatch_*.txt run logs whose newest files are merged
    /// into the report.
    #[clap(long, value_parser = parse_path)]
    pub logs: Option<PathBuf>,

    /// Print cache statistics instead of the report.
    #[clap(long)]
    pub stats: bool,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db.clone(),
            jobs_path: self.jobs.clone(),
            history_path: self.history.clone(),
            history_retention: self.history_retention,
            format: self.format,
            output: self.output.clone(),
            identifier_scheme: self.identifier_scheme.clone(),
            logs_dir: self.logs.clone(),
        }
    }
}

fn render_stats(db_path: &Path, stats: Option<&CacheStats>, format: ReportFormat) -> Result<String> {
    if format == ReportFormat::Json {
        return serde_json::to_string_pretty(&stats).context("Failed to serialize cache stats");
    }
    let Some(stats) = stats else {
        return Ok(format!(
            "{}\n{}\n",
            db_path.display(),
            urlwatch_report::report::NO_DATA_MESSAGE
        ));
    };

    let mut lines = vec![
        format!("Database: {}", db_path.display()),
        format!("Schema variant: {}", stats.variant),
        format!("Total records: {}", stats.total_records),
        format!("Distinct identifiers: {}", stats.distinct_identifiers),
        format!("Earliest record: {}", format_time(stats.earliest)),
        format!("Latest record: {}", format_time(stats.latest)),
        format!("Successful records: {}", stats.successful_records()),
    ];
    for (tries, count) in &stats.records_by_tries {
        lines.push(format!("  tries={}: {} records", tries, count));
    }
    Ok(lines.join("\n") + "\n")
}

fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write report to {:?}", path))?;
            info!("Report written to {:?}", path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .context("Failed to write report to stdout")?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;
    info!("Using cache database {:?}", config.db_path);

    let reconciler = Reconciler::new(config.identifier_scheme);

    if cli_args.stats {
        let stats = reconciler
            .stats(&config.db_path)
            .context("Failed to read cache statistics")?;
        let rendered = render_stats(&config.db_path, stats.as_ref(), config.format)?;
        return write_output(config.output.as_deref(), &rendered);
    }

    let jobs = match &config.jobs_path {
        Some(path) => load_jobs(path)?,
        None => Vec::new(),
    };
    let reconciliation = reconciler
        .reconcile(&config.db_path, &jobs)
        .context("Failed to reconcile cache database")?;

    let generated_at = Utc::now();
    let history = match &config.history_path {
        Some(path) => {
            let mut history = ChangeHistory::load(path, config.history_retention)?;
            let appended = history.absorb(&reconciliation, generated_at);
            if appended > 0 {
                history.save(path)?;
            }
            Some(history)
        }
        None => None,
    };

    let mut report = Report::build(&reconciliation, generated_at);
    if let Some(logs_dir) = &config.logs_dir {
        let activity = LogAnalyzer::new()?
            .analyze_dir(logs_dir, DEFAULT_LOG_FILES)
            .with_context(|| format!("Failed to analyze logs in {:?}", logs_dir))?;
        report = report.with_log_activity(activity);
    }
    let rendered = report
        .render(config.format, history.as_ref())
        .context("Failed to render report")?;
    write_output(config.output.as_deref(), &rendered)
}
