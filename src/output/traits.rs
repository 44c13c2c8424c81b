//! Event listener traits
//!
//! The coordinator reports progress and partial results through these traits while a
//! search is running. Listeners are called synchronously on the crawl worker; handing
//! events over to a UI thread is up to the implementation.

use crate::state::FileMatch;
use std::fmt;
use std::sync::Arc;

/// The kind of request the coordinator is about to make
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Fetching a page of search results
    PageFetch,
    /// Fetching the full list of matching lines of one file
    LineFetch,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageFetch => write!(f, "page-fetch"),
            Self::LineFetch => write!(f, "line-fetch"),
        }
    }
}

/// Receives progress reports during a search run
///
/// The number of requests a query needs is not known up front. The pending count
/// grows as further result pages and abridged files are discovered.
pub trait ProgressListener: Send + Sync {
    /// Called before each HTTP request
    ///
    /// # Arguments
    ///
    /// * `phase` - What the request is for
    /// * `current` - Index of the request, counting from zero
    /// * `pending` - Requests known to be outstanding at this point
    fn progress(&self, phase: Phase, current: usize, pending: usize);

    /// Called after matches or lines have been merged into the result
    fn current_counts(&self, dir_count: usize, file_count: usize, line_count: usize);
}

/// Receives partial results during a search run
pub trait ResultReceiver: Send + Sync {
    /// Called when a result page yielded files that were not known before
    ///
    /// The matches may be abridged; if the coordinator fetches their remaining lines,
    /// that is reported later through `new_line_matches`.
    fn new_file_matches(&self, new_matches: &[Arc<FileMatch>]);

    /// Called when a file match reported earlier has been amended with more lines
    fn new_line_matches(&self, amended: &Arc<FileMatch>);
}

/// Registered listeners of a coordinator
#[derive(Default, Clone)]
pub struct EventRegistry {
    progress_listeners: Vec<Arc<dyn ProgressListener>>,
    result_receivers: Vec<Arc<dyn ResultReceiver>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_progress_listener(&mut self, listener: Arc<dyn ProgressListener>) {
        self.progress_listeners.push(listener);
    }

    pub fn add_result_receiver(&mut self, receiver: Arc<dyn ResultReceiver>) {
        self.result_receivers.push(receiver);
    }

    pub fn notify_progress(&self, phase: Phase, current: usize, pending: usize) {
        for l in &self.progress_listeners {
            l.progress(phase, current, pending);
        }
    }

    pub fn notify_counts(&self, dir_count: usize, file_count: usize, line_count: usize) {
        for l in &self.progress_listeners {
            l.current_counts(dir_count, file_count, line_count);
        }
    }

    pub fn notify_new_file_matches(&self, matches: &[Arc<FileMatch>]) {
        if matches.is_empty() {
            return;
        }
        for r in &self.result_receivers {
            r.new_file_matches(matches);
        }
    }

    pub fn notify_new_line_matches(&self, amended: &Arc<FileMatch>) {
        for r in &self.result_receivers {
            r.new_line_matches(amended);
        }
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("progress_listeners", &self.progress_listeners.len())
            .field("result_receivers", &self.result_receivers.len())
            .finish()
    }
}

/// Progress listener that reports through `tracing`
#[derive(Debug, Default)]
pub struct LoggingListener;

impl ProgressListener for LoggingListener {
    fn progress(&self, phase: Phase, current: usize, pending: usize) {
        tracing::info!("{} #{} ({} pending)", phase, current + 1, pending);
    }

    fn current_counts(&self, dir_count: usize, file_count: usize, line_count: usize) {
        tracing::debug!(
            "{} directories, {} files, {} lines so far",
            dir_count,
            file_count,
            line_count
        );
    }
}
