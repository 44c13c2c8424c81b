//! Statistics and text rendering of search results
//!
//! This module provides functionality for summarizing a finished `SearchResult`
//! and printing it as a directory / file / line tree.

use crate::state::{FileMatch, LineMatch, SearchResult};
use std::fmt::Write;

/// Search statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    pub pages_fetched: usize,
    pub pages_unfetched: usize,
    pub directories: usize,
    pub files: usize,
    pub lines: usize,

    /// Files whose full line list was not fetched
    pub abridged_files: usize,

    pub page_limit_triggered: bool,
    pub aborted: bool,
}

impl SearchStatistics {
    pub fn from_result(result: &SearchResult) -> Self {
        Self {
            pages_fetched: result.fetched_page_count(),
            pages_unfetched: result.unfetched_page_count(),
            directories: result.dir_count(),
            files: result.file_count(),
            lines: result.line_count(),
            abridged_files: result.files().iter().filter(|m| m.is_abridged()).count(),
            page_limit_triggered: result.page_limit_triggered(),
            aborted: result.aborted(),
        }
    }

    /// True if the result does not hold every match the server knows of
    pub fn is_incomplete(&self) -> bool {
        self.page_limit_triggered || self.aborted || self.abridged_files > 0
    }
}

/// Renders a line with its highlighted spans in brackets
///
/// # Example
///
/// ```
/// use ogre_scrape::output::stats::format_line;
/// use ogre_scrape::LineMatch;
///
/// let line = LineMatch::new(7, "int foo;".to_string(), None, &[4, 7]);
/// assert_eq!(format_line(&line), "7: int [foo];");
/// ```
pub fn format_line(line: &LineMatch) -> String {
    let mut out = format!("{}: ", line.line_number());
    let mut pos = 0;

    // Highlight offsets count characters, not bytes
    let chars: Vec<char> = line.text().chars().collect();
    for h in line.highlights() {
        let start = h.start.min(chars.len());
        let end = h.end.min(chars.len()).max(start);
        out.extend(&chars[pos.min(start)..start]);
        out.push('[');
        out.extend(&chars[start..end]);
        out.push(']');
        pos = end;
    }
    out.extend(&chars[pos.min(chars.len())..]);
    out
}

fn format_file(out: &mut String, file_match: &FileMatch) {
    let _ = writeln!(
        out,
        "  {}{}",
        file_match.filename(),
        if file_match.is_abridged() {
            " (abridged)"
        } else {
            ""
        }
    );
    for line in file_match.lines() {
        let _ = writeln!(out, "    {}", format_line(&line));
    }
}

/// Renders all matches as a tree, grouped by directory in first-seen order
pub fn format_result_tree(result: &SearchResult) -> String {
    let mut out = String::new();
    let mut current_dir: Option<&str> = None;

    // Files of one directory need not be adjacent when they came from different pages
    let mut dirs: Vec<&str> = Vec::new();
    for m in result.files() {
        if !dirs.contains(&m.directory()) {
            dirs.push(m.directory());
        }
    }

    for dir in dirs {
        for m in result.files().iter().filter(|m| m.directory() == dir) {
            if current_dir != Some(dir) {
                let _ = writeln!(out, "{}", dir);
                current_dir = Some(dir);
            }
            format_file(&mut out, m);
        }
    }

    out
}

/// Prints the result tree to stdout
pub fn print_result_tree(result: &SearchResult) {
    print!("{}", format_result_tree(result));
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SearchStatistics) {
    println!("=== Search Statistics ===\n");

    println!("Pages:");
    println!("  Fetched: {}", stats.pages_fetched);
    println!("  Not fetched: {}", stats.pages_unfetched);
    println!();

    println!("Matches:");
    println!("  Directories: {}", stats.directories);
    println!("  Files: {}", stats.files);
    println!("  Lines: {}", stats.lines);
    if stats.abridged_files > 0 {
        println!("  Files with lines missing: {}", stats.abridged_files);
    }
    println!();

    if stats.page_limit_triggered {
        println!("The page limit was reached; there are more results on the server.");
    }
    if stats.aborted {
        println!("The search was cancelled before it completed.");
    }
}
