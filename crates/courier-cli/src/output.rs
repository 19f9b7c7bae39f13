//! Batch report formatting for the terminal.

use courier_core::domain::{BatchReport, UploadResult};

pub fn format_json(report: &BatchReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

pub fn format_human(report: &BatchReport) -> String {
    let mut lines = Vec::with_capacity(report.outcomes.len() + 1);
    for outcome in &report.outcomes {
        let file = &outcome.file;
        let line = match &outcome.result {
            UploadResult::Success { url } => {
                format!("  ok    {} ({}) -> {url}", file.name, file.display_size())
            }
            UploadResult::Failure { reason } => {
                format!("  fail  {} ({}): {reason}", file.name, file.display_size())
            }
        };
        lines.push(line);
    }
    lines.push(format!(
        "batch {}: {} uploaded, {} failed",
        report.batch_id,
        report.succeeded_urls.len(),
        report.outcomes.len() - report.succeeded_urls.len()
    ));
    lines.join("\n")
}
