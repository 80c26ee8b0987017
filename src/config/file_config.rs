use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Values read from the optional TOML config file. Every field is optional;
/// unset fields fall back to the command line.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_path: Option<String>,
    pub jobs_path: Option<String>,
    pub history_path: Option<String>,
    pub history_retention: Option<usize>,
    pub format: Option<String>,
    pub output: Option<String>,
    pub identifier_scheme: Option<String>,
    pub logs_dir: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
