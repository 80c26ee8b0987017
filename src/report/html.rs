use super::{format_time, Report, NO_DATA_MESSAGE};
use crate::history::{ChangeHistory, ChangeKind};
use std::fmt::Write;

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub(super) fn render(report: &Report, history: Option<&ChangeHistory>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html><head><meta charset=\"utf-8\"><title>URL Watch Report</title></head><body>");
    let _ = writeln!(
        out,
        "<h1>URL Watch Report</h1>\n<p>Generated: {}</p>",
        escape(&format_time(Some(report.generated_at)))
    );

    if !report.is_initialized() {
        let _ = writeln!(out, "<p>{}</p>", escape(NO_DATA_MESSAGE));
        let _ = writeln!(out, "</body></html>");
        return out;
    }

    for entry in &report.entries {
        let name = escape(&entry.display_name);
        let _ = writeln!(out, "<div class=\"{}\">", entry.status.as_str());
        match &entry.url {
            Some(url) => {
                let _ = writeln!(out, "<a href=\"{}\">{}</a><br>", escape(url), name);
            }
            None => {
                let _ = writeln!(out, "<span>{}</span><br>", name);
            }
        }
        let _ = writeln!(
            out,
            "Last change: {}<br>",
            escape(&format_time(entry.last_change))
        );
        if let Some(site) = report.site_activity(entry) {
            let _ = writeln!(
                out,
                "Recent logs: {} checks, {} errors<br>",
                site.total_checks, site.error_count
            );
        }
        if entry.recent_attempts.len() > 1 {
            let _ = writeln!(out, "<details>\n<summary>Recent attempts</summary>\n<ol>");
            for attempt in &entry.recent_attempts {
                let _ = writeln!(
                    out,
                    "<li>{} {} ({} tries)</li>",
                    escape(&format_time(attempt.timestamp)),
                    attempt.status_str(),
                    attempt.tries
                );
            }
            let _ = writeln!(out, "</ol>\n</details>");
        }

        // Earlier changes, newest first, without the one shown above.
        let previous: Vec<String> = history
            .and_then(|h| h.get(&entry.identifier))
            .map(|target| {
                target
                    .changes
                    .iter()
                    .rev()
                    .filter(|c| matches!(c.kind, ChangeKind::New | ChangeKind::Changed))
                    .filter(|c| Some(c.timestamp) != entry.last_change)
                    .map(|c| format_time(Some(c.timestamp)))
                    .collect()
            })
            .unwrap_or_default();
        if !previous.is_empty() {
            let _ = writeln!(out, "<details>\n<summary>Earlier changes</summary>\n<ul>");
            for date in previous {
                let _ = writeln!(out, "<li>{}</li>", escape(&date));
            }
            let _ = writeln!(out, "</ul>\n</details>");
        }
        let _ = writeln!(out, "</div><hr>");
    }

    if !report.unseen_jobs.is_empty() {
        let _ = writeln!(out, "<h2>Jobs with no data yet</h2>\n<ul>");
        for job in &report.unseen_jobs {
            let _ = writeln!(
                out,
                "<li><a href=\"{}\">{}</a></li>",
                escape(&job.url),
                escape(&job.name)
            );
        }
        let _ = writeln!(out, "</ul>");
    }
    let _ = writeln!(out, "</body></html>");
    out
}
