use super::{format_time, Report, NO_DATA_MESSAGE};
use crate::cache::EntryStatus;
use std::fmt::Write;

pub(super) fn render(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# URL Watch Monitoring Summary");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "**Generated:** {}",
        format_time(Some(report.generated_at))
    );
    let _ = writeln!(out);

    if !report.is_initialized() {
        let _ = writeln!(out, "> {}", NO_DATA_MESSAGE);
        return out;
    }

    let summary = &report.summary;
    let _ = writeln!(out, "## Overview");
    let _ = writeln!(out, "- **Total sites monitored:** {}", summary.total);
    let _ = writeln!(out, "- **Sites OK:** {} ✅", summary.successful);
    let _ = writeln!(out, "- **Sites with errors:** {} ❌", summary.failing);
    if summary.unseen_jobs > 0 {
        let _ = writeln!(out, "- **Jobs with no data yet:** {}", summary.unseen_jobs);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Sites Status");
    let _ = writeln!(out);

    for entry in &report.entries {
        let icon = match entry.status {
            EntryStatus::Successful => "✅",
            EntryStatus::Failing => "❌",
        };
        let _ = writeln!(out, "### {} {}", icon, entry.display_name);
        match &entry.url {
            Some(url) => {
                let _ = writeln!(out, "- **URL:** `{}`", url);
            }
            None => {
                let _ = writeln!(out, "- **Identifier:** `{}`", entry.identifier);
            }
        }
        let _ = writeln!(out, "- **Last change:** {}", format_time(entry.last_change));
        let _ = writeln!(out, "- **Last check:** {}", format_time(entry.last_seen));
        let _ = writeln!(out, "- **Status:** {}", entry.status.as_str());
        if entry.tries > 0 {
            let _ = writeln!(out, "- **Retries:** {}", entry.tries);
        }
        let _ = writeln!(out, "- **Total checks:** {}", entry.record_count);
        if let Some(site) = report.site_activity(entry) {
            let _ = writeln!(
                out,
                "- **Checks in recent logs:** {} ({} errors)",
                site.total_checks, site.error_count
            );
            let _ = writeln!(
                out,
                "- **Last successful check in logs:** {}",
                format_time(site.last_successful_check)
            );
            if site.last_error.is_some() {
                let _ = writeln!(
                    out,
                    "- **Last error in logs:** {}",
                    format_time(site.last_error)
                );
            }
        }
        if entry.recent_attempts.len() > 1 {
            let _ = writeln!(out, "- **Recent attempts:**");
            for (i, attempt) in entry.recent_attempts.iter().enumerate() {
                let icon = if attempt.has_content { "✅" } else { "❌" };
                let _ = writeln!(
                    out,
                    "  {}. {} {} ({} tries)",
                    i + 1,
                    format_time(attempt.timestamp),
                    icon,
                    attempt.tries
                );
            }
        }
        let _ = writeln!(out);
    }

    if !report.unseen_jobs.is_empty() {
        let _ = writeln!(out, "## Jobs With No Data Yet");
        let _ = writeln!(out);
        for job in &report.unseen_jobs {
            let _ = writeln!(out, "- {} (`{}`)", job.name, job.url);
        }
        let _ = writeln!(out);
    }
    out
}
