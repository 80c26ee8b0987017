use super::{format_time, Report, NO_DATA_MESSAGE};
use std::fmt::Write;
use unicode_width::UnicodeWidthStr;

const HEADERS: [&str; 5] = ["Last change", "Last check", "Status", "Name", "URL"];

fn pad(cell: &str, width: usize) -> String {
    let fill = width.saturating_sub(cell.width());
    format!("{}{}", cell, " ".repeat(fill))
}

pub(super) fn render(report: &Report) -> String {
    let mut out = String::new();
    let rule = "=".repeat(80);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "URL WATCH STATUS REPORT");
    let _ = writeln!(out, "Generated: {}", format_time(Some(report.generated_at)));
    let _ = writeln!(out, "Database: {}", report.db_path);
    let _ = writeln!(out, "{}", rule);

    if !report.is_initialized() {
        let _ = writeln!(out, "{}", NO_DATA_MESSAGE);
        return out;
    }

    let rows: Vec<[String; 5]> = report
        .entries
        .iter()
        .map(|entry| {
            let status = if entry.tries > 0 {
                format!("{} ({} retries)", entry.status.as_str(), entry.tries)
            } else {
                entry.status.as_str().to_string()
            };
            [
                format_time(entry.last_change),
                format_time(entry.last_seen),
                status,
                entry.display_name.clone(),
                entry.url.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.width()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.width());
        }
    }

    let header: Vec<String> = HEADERS
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(h, *w))
        .collect();
    let _ = writeln!(out, "{}", header.join(" | ").trim_end());
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", separator.join("-+-"));
    for row in &rows {
        let cells: Vec<String> = row.iter().zip(&widths).map(|(c, w)| pad(c, *w)).collect();
        let _ = writeln!(out, "{}", cells.join(" | ").trim_end());
    }

    let summary = &report.summary;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} sites: {} successful, {} failing",
        summary.total, summary.successful, summary.failing
    );

    let with_attempts: Vec<_> = report
        .entries
        .iter()
        .filter(|e| e.recent_attempts.len() > 1)
        .collect();
    if !with_attempts.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Recent attempts:");
        for entry in with_attempts {
            let _ = writeln!(out, "  {}", entry.display_name);
            for (i, attempt) in entry.recent_attempts.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "    {}. {} {} ({} tries)",
                    i + 1,
                    format_time(attempt.timestamp),
                    attempt.status_str(),
                    attempt.tries
                );
            }
        }
    }

    if let Some(activity) = &report.log_activity {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Log activity ({} files analyzed):",
            activity.files_analyzed
        );
        for (url, site) in &activity.sites {
            let _ = writeln!(
                out,
                "  {} ({}): {} checks, {} errors, last OK {}, last error {}",
                site.name,
                url,
                site.total_checks,
                site.error_count,
                format_time(site.last_successful_check),
                format_time(site.last_error)
            );
        }
    }

    if !report.unseen_jobs.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Configured jobs with no cache data yet:");
        for job in &report.unseen_jobs {
            let _ = writeln!(out, "  - {} ({})", job.name, job.url);
        }
    }
    out
}
