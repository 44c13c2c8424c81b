//! Markdown report generation
//!
//! This module generates a human-readable markdown report of a search run,
//! including statistics and every matching line, grouped by file.

use crate::output::stats::{format_line, SearchStatistics};
use crate::state::SearchResult;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// What was searched, where and when
#[derive(Debug, Clone)]
pub struct ReportInfo {
    pub server: String,
    pub query: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Writes a markdown report of a search run
///
/// # Arguments
///
/// * `info` - Server, query and timing of the run
/// * `result` - The finished search result
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(std::io::Error)` - Failed to write the report
pub fn write_markdown_report(
    info: &ReportInfo,
    result: &SearchResult,
    output_path: &Path,
) -> std::io::Result<()> {
    let markdown = format_markdown_report(info, result);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    tracing::info!("Wrote report to {}", output_path.display());
    Ok(())
}

/// Formats a search run as markdown
pub fn format_markdown_report(info: &ReportInfo, result: &SearchResult) -> String {
    let stats = SearchStatistics::from_result(result);
    let mut md = String::new();

    // Title
    md.push_str("# OpenGrok Search Report\n\n");

    // Run metadata
    md.push_str("## Search\n\n");
    md.push_str(&format!("- **Server**: {}\n", info.server));
    md.push_str(&format!("- **Query**: `{}`\n", info.query));
    md.push_str(&format!(
        "- **Started**: {}\n",
        info.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    let duration = info.finished_at - info.started_at;
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds\n\n",
        duration.num_milliseconds() as f64 / 1000.0
    ));

    // Overall statistics
    md.push_str("## Statistics\n\n");
    md.push_str("| | Count |\n");
    md.push_str("|-|-------|\n");
    md.push_str(&format!("| Pages fetched | {} |\n", stats.pages_fetched));
    md.push_str(&format!("| Pages not fetched | {} |\n", stats.pages_unfetched));
    md.push_str(&format!("| Directories | {} |\n", stats.directories));
    md.push_str(&format!("| Files | {} |\n", stats.files));
    md.push_str(&format!("| Lines | {} |\n\n", stats.lines));

    if stats.page_limit_triggered {
        md.push_str("> The page limit was reached. The server has more results.\n\n");
    }
    if stats.aborted {
        md.push_str("> The search was cancelled before it completed.\n\n");
    }

    // Matches
    if !result.files().is_empty() {
        md.push_str("## Matches\n\n");
    }
    for m in result.files() {
        match m.xref_link() {
            Some(link) => md.push_str(&format!("### [{}]({})\n\n", m.full_path(), link.url)),
            None => md.push_str(&format!("### {}\n\n", m.full_path())),
        }

        let lines = m.lines();
        if !lines.is_empty() {
            md.push_str("```\n");
            for line in &lines {
                md.push_str(&format_line(line));
                md.push('\n');
            }
            md.push_str("```\n\n");
        }
        if m.is_abridged() {
            md.push_str("*Not all matching lines were fetched.*\n\n");
        }
    }

    md
}
