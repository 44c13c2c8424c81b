//! State module for tracking search progress
//!
//! This module provides the data model and aggregation state of a search run.
//!
//! # Components
//!
//! - `CrawlState`: Tracks which phase a search run is in
//! - `FileMatch`, `LineMatch`, `Highlight`: Search hits for files and lines
//! - `SearchResult`: Deduplicated matches, page queue and running counts of one run

mod crawl_state;
mod file_match;
mod search_result;

// Re-export main types
pub use crawl_state::CrawlState;
pub use file_match::{FileMatch, Highlight, LineMatch};
pub use search_result::{Merged, SearchResult};
