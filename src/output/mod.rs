//! Output module for search events and reports
//!
//! This module handles:
//! - The listener traits through which a running search reports progress and
//!   partial results
//! - Text rendering and statistics of finished results
//! - Markdown reports

mod markdown;
pub mod stats;
mod traits;

pub use markdown::{format_markdown_report, write_markdown_report, ReportInfo};
pub use stats::{format_result_tree, print_result_tree, print_statistics, SearchStatistics};
pub use traits::{EventRegistry, LoggingListener, Phase, ProgressListener, ResultReceiver};
