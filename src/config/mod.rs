mod file_config;

pub use file_config::FileConfig;

use crate::history::DEFAULT_RETENTION;
use crate::jobs::IdentifierScheme;
use crate::report::ReportFormat;
use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DB_PATH_ENV_VAR: &str = "URLWATCH_CACHE_DB";

/// CLI arguments that can be used for config resolution.
/// Values from the TOML config file take precedence over these.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub jobs_path: Option<PathBuf>,
    pub history_path: Option<PathBuf>,
    pub history_retention: Option<usize>,
    pub format: ReportFormat,
    pub output: Option<PathBuf>,
    pub identifier_scheme: Option<String>,
    pub logs_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub jobs_path: Option<PathBuf>,
    pub history_path: Option<PathBuf>,
    pub history_retention: usize,
    pub format: ReportFormat,
    pub output: Option<PathBuf>,
    pub identifier_scheme: IdentifierScheme,
    /// Directory holding `urlwatch_*.txt` run logs to analyze.
    pub logs_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present. Without either, the
    /// database path comes from the environment or the platform default.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = match file.db_path.map(PathBuf::from).or_else(|| cli.db_path.clone()) {
            Some(path) => path,
            None => default_db_path(),
        };
        if db_path.is_dir() {
            bail!("Database path is a directory: {:?}", db_path);
        }

        let jobs_path = file
            .jobs_path
            .map(PathBuf::from)
            .or_else(|| cli.jobs_path.clone());
        let history_path = file
            .history_path
            .map(PathBuf::from)
            .or_else(|| cli.history_path.clone());

        let logs_dir = file
            .logs_dir
            .map(PathBuf::from)
            .or_else(|| cli.logs_dir.clone());

        let history_retention = file
            .history_retention
            .or(cli.history_retention)
            .unwrap_or(DEFAULT_RETENTION);
        if history_retention == 0 {
            bail!("history_retention must be at least 1");
        }

        let format = match file.format {
            Some(name) => parse_format(&name)
                .ok_or_else(|| anyhow!("Unknown report format in config file: '{}'", name))?,
            None => cli.format,
        };

        // An output path without extension gets the one of the report format.
        let output = file
            .output
            .map(PathBuf::from)
            .or_else(|| cli.output.clone())
            .map(|path| match path.extension() {
                Some(_) => path,
                None => path.with_extension(format.extension()),
            });

        let identifier_scheme = match file
            .identifier_scheme
            .or_else(|| cli.identifier_scheme.clone())
        {
            Some(name) => name
                .parse::<IdentifierScheme>()
                .context("Invalid identifier scheme")?,
            None => IdentifierScheme::default(),
        };

        Ok(Self {
            db_path,
            jobs_path,
            history_path,
            history_retention,
            format,
            output,
            identifier_scheme,
            logs_dir,
        })
    }
}

fn parse_format(s: &str) -> Option<ReportFormat> {
    ReportFormat::from_str(s, true).ok()
}

/// Where urlwatch keeps its cache when no path is configured, most likely first.
/// The data directory `urls.db` holds the older `job_state` table.
pub fn default_db_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(cache_dir) = dirs::cache_dir() {
        candidates.push(cache_dir.join("urlwatch").join("cache.db"));
    }
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("urlwatch").join("cache.db"));
    }
    candidates.push(Path::new(".urlwatch").join("cache.db"));
    candidates.push(PathBuf::from("cache.db"));
    candidates.push(Path::new("logs").join("cache.db"));
    if let Some(data_dir) = dirs::data_dir() {
        candidates.push(data_dir.join("urlwatch").join("urls.db"));
    }
    candidates
}

/// The database path used when neither the config file nor the command line
/// names one: `URLWATCH_CACHE_DB` if set, else the first existing default
/// candidate, else the primary candidate.
pub fn default_db_path() -> PathBuf {
    let env_override = std::env::var_os(DB_PATH_ENV_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    pick_db_path(env_override, &default_db_candidates())
}

fn pick_db_path(env_override: Option<PathBuf>, candidates: &[PathBuf]) -> PathBuf {
    if let Some(path) = env_override {
        debug!("Using cache database from {}: {:?}", DB_PATH_ENV_VAR, path);
        return path;
    }
    if let Some(existing) = candidates.iter().find(|p| p.is_file()) {
        debug!("Found cache database at {:?}", existing);
        return existing.clone();
    }
    candidates
        .first()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("cache.db"))
}
