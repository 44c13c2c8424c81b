//! Aggregated state of one search run
//!
//! Holds the deduplicated file matches, the queue of result pages discovered so far,
//! the queue of abridged file matches still waiting for their full line list, and
//! running counts. Only the crawl worker mutates it; the counts are maintained
//! incrementally as matches and lines are merged.

use crate::crawler::ResultPage;
use crate::state::{FileMatch, LineMatch};
use crate::url::{is_start_page_link, WebLink};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Outcome of merging a parsed file match into the result
#[derive(Debug, Clone)]
pub enum Merged {
    /// The file was not known before; the match was added as is
    New(Arc<FileMatch>),
    /// The file was already known; the existing entry was amended
    Amended {
        existing: Arc<FileMatch>,
        lines_added: usize,
    },
}

impl Merged {
    /// The file match that represents the file in the search result from now on
    pub fn file_match(&self) -> &Arc<FileMatch> {
        match self {
            Self::New(m) => m,
            Self::Amended { existing, .. } => existing,
        }
    }
}

/// The result of a search run
#[derive(Debug)]
pub struct SearchResult {
    matches: Vec<Arc<FileMatch>>,
    by_path: HashMap<String, usize>,
    next_abridged: usize,

    result_pages: Vec<WebLink>,
    known_pages: HashSet<String>,
    next_page: usize,

    limit_triggered: bool,
    aborted: bool,

    dir_names: HashSet<String>,
    line_count: usize,
}

impl SearchResult {
    /// Creates the state for a run whose only known page is the search URL itself
    pub fn new(start: WebLink) -> Self {
        let mut known_pages = HashSet::new();
        known_pages.insert(start.url.as_str().to_string());

        Self {
            matches: Vec::new(),
            by_path: HashMap::new(),
            next_abridged: 0,
            result_pages: vec![start],
            known_pages,
            next_page: 0,
            limit_triggered: false,
            aborted: false,
            dir_names: HashSet::new(),
            line_count: 0,
        }
    }

    // Public API

    /// All file matches, in the order they were first found
    pub fn files(&self) -> &[Arc<FileMatch>] {
        &self.matches
    }

    /// Looks up the match for a file by its full path
    pub fn file(&self, full_path: &str) -> Option<&Arc<FileMatch>> {
        self.by_path.get(full_path).map(|&i| &self.matches[i])
    }

    /// True if the run stopped because the page limit was reached while further
    /// result pages were still pending
    pub fn page_limit_triggered(&self) -> bool {
        self.limit_triggered
    }

    /// True if the run was cancelled
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn fetched_page_count(&self) -> usize {
        self.next_page
    }

    pub fn unfetched_page_count(&self) -> usize {
        self.result_pages.len() - self.next_page
    }

    /// Number of file matches that are still abridged
    pub fn abridged_file_count(&self) -> usize {
        self.matches[self.next_abridged.min(self.matches.len())..]
            .iter()
            .filter(|m| m.is_abridged())
            .count()
    }

    pub fn dir_count(&self) -> usize {
        self.dir_names.len()
    }

    pub fn file_count(&self) -> usize {
        self.matches.len()
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    // Crawl worker API

    /// Returns the next result page to fetch without advancing the page cursor
    ///
    /// Repeated calls return the same link until `notify_fetched` is called.
    pub fn next_page(&self) -> Option<&WebLink> {
        self.result_pages.get(self.next_page)
    }

    /// Records that the next page has been fetched and queues its pager links
    ///
    /// Links already on the queue and links back to the first page are skipped. Every
    /// result page repeats most of the same "jump to page N" links, so most of them
    /// are dropped here.
    pub fn notify_fetched(&mut self, page: &ResultPage) {
        self.next_page += 1;

        for link in &page.page_links {
            if is_start_page_link(&link.url) {
                tracing::trace!("Skipping link to first page: {}", link.url);
                continue;
            }

            if !self.known_pages.insert(link.url.as_str().to_string()) {
                continue;
            }

            tracing::trace!("Queued result page: {}", link.url);
            self.result_pages.push(link.clone());
        }
    }

    /// Merges a parsed file match into the result
    ///
    /// A file seen for the first time is added as is. Otherwise any lines not yet
    /// known are merged into the existing entry, which is returned so callers can tell
    /// new files from amended ones.
    pub fn merge_file_match(&mut self, file_match: FileMatch) -> Merged {
        let full_path = file_match.full_path();

        if let Some(&index) = self.by_path.get(&full_path) {
            let existing = Arc::clone(&self.matches[index]);
            let lines_added = existing.merge(file_match);
            self.line_count += lines_added;
            return Merged::Amended {
                existing,
                lines_added,
            };
        }

        self.dir_names.insert(file_match.directory().to_string());
        self.line_count += file_match.line_count();

        let file_match = Arc::new(file_match);
        self.by_path.insert(full_path, self.matches.len());
        self.matches.push(Arc::clone(&file_match));

        Merged::New(file_match)
    }

    /// Returns the next file match that is still abridged, or None when there are none
    ///
    /// The cursor only moves forward; matches that are no longer abridged are passed
    /// over for good.
    pub fn next_abridged_file(&mut self) -> Option<Arc<FileMatch>> {
        while self.next_abridged < self.matches.len()
            && !self.matches[self.next_abridged].is_abridged()
        {
            self.next_abridged += 1;
        }

        self.matches.get(self.next_abridged).cloned()
    }

    /// Passes over the current abridged file without fetching its lines
    ///
    /// Used when an abridged file has no usable link to its full line list. The file
    /// stays abridged.
    pub fn skip_abridged_file(&mut self) {
        if self.next_abridged < self.matches.len() {
            self.next_abridged += 1;
        }
    }

    /// Merges the complete line list of a file and clears its abridged flag
    ///
    /// Returns the number of lines that were new.
    pub fn merge_lines(&mut self, file_match: &FileMatch, lines: Vec<LineMatch>) -> usize {
        let mut added = 0;
        for line in lines {
            if file_match.add_line(line) {
                added += 1;
            }
        }
        self.line_count += added;
        file_match.set_unabridged();
        added
    }

    pub(crate) fn set_page_limit_triggered(&mut self, triggered: bool) {
        self.limit_triggered = triggered;
    }

    pub(crate) fn set_aborted(&mut self, aborted: bool) {
        self.aborted = aborted;
    }
}
