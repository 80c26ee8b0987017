//! Rendering of reconciliations into human-readable reports.

mod html;
mod markdown;
mod text;

use crate::cache::{CacheState, EntryStatus, NormalizedEntry, Reconciliation};
use crate::history::ChangeHistory;
use crate::jobs::JobDescriptor;
use crate::logs::{LogActivity, SiteActivity};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const UNKNOWN_TIME: &str = "unknown";
pub const NO_DATA_MESSAGE: &str =
    "The cache database does not exist yet. Has the watcher run at least once?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Markdown,
    Html,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
            ReportFormat::Html => "html",
        }
    }
}

pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN_TIME.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub successful: usize,
    pub failing: usize,
    pub unseen_jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub db_path: String,
    #[serde(flatten)]
    pub state: CacheState,
    pub summary: Summary,
    pub entries: Vec<NormalizedEntry>,
    pub unseen_jobs: Vec<JobDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_activity: Option<LogActivity>,
}

impl Report {
    pub fn build(reconciliation: &Reconciliation, generated_at: DateTime<Utc>) -> Self {
        let successful = reconciliation
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Successful)
            .count();
        Report {
            generated_at,
            db_path: reconciliation.db_path.display().to_string(),
            state: reconciliation.state.clone(),
            summary: Summary {
                total: reconciliation.entries.len(),
                successful,
                failing: reconciliation.entries.len() - successful,
                unseen_jobs: reconciliation.unseen_jobs.len(),
            },
            entries: reconciliation.entries.clone(),
            unseen_jobs: reconciliation.unseen_jobs.clone(),
            log_activity: None,
        }
    }

    /// Adds what the run logs recorded for each site.
    pub fn with_log_activity(mut self, activity: LogActivity) -> Self {
        self.log_activity = Some(activity);
        self
    }

    /// Log activity of the site behind `entry`, matched by URL.
    pub(crate) fn site_activity(&self, entry: &NormalizedEntry) -> Option<&SiteActivity> {
        let url = entry.url.as_deref()?;
        self.log_activity.as_ref()?.site(url)
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, CacheState::NotInitialized)
    }

    /// Renders the report. The history, when given, adds earlier change dates
    /// to the formats that show them.
    pub fn render(
        &self,
        format: ReportFormat,
        history: Option<&ChangeHistory>,
    ) -> Result<String, serde_json::Error> {
        Ok(match format {
            ReportFormat::Text => text::render(self),
            ReportFormat::Json => serde_json::to_string_pretty(self)?,
            ReportFormat::Markdown => markdown::render(self),
            ReportFormat::Html => html::render(self, history),
        })
    }
}
