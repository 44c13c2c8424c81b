//! File and line match records
//!
//! A `FileMatch` is shared between the crawl worker and whoever is consuming results
//! while the crawl is still running, so its line map sits behind a mutex and the
//! abridged flag is atomic. Directory, filename and links never change after parsing.

use crate::url::WebLink;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// A matched substring of a line, as a half-open character range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub start: usize,
    pub end: usize,
}

impl Highlight {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of characters covered by the highlight
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single line of a file that matched the query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    line_number: u32,
    text: String,
    link: Option<WebLink>,
    highlights: Vec<Highlight>,
}

impl LineMatch {
    /// Creates a line match from a flat list of highlight offsets
    ///
    /// Offsets come in start/end pairs, so `positions` must have even length.
    ///
    /// # Panics
    ///
    /// Panics if `positions` has odd length.
    pub fn new(line_number: u32, text: String, link: Option<WebLink>, positions: &[usize]) -> Self {
        assert!(
            positions.len() % 2 == 0,
            "highlight position list has odd length {}",
            positions.len()
        );

        let highlights = positions
            .chunks_exact(2)
            .map(|pair| Highlight::new(pair[0], pair[1]))
            .collect();

        Self {
            line_number,
            text,
            link,
            highlights,
        }
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn link(&self) -> Option<&WebLink> {
        self.link.as_ref()
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    /// Returns the highlighted substrings of the line, in order
    pub fn highlighted_parts(&self) -> Vec<String> {
        self.highlights
            .iter()
            .map(|h| self.text.chars().skip(h.start).take(h.len()).collect())
            .collect()
    }
}

/// The search hit for one file, with the lines in it that matched
pub struct FileMatch {
    directory: String,
    filename: String,
    xref_link: Option<WebLink>,
    lines: Mutex<BTreeMap<u32, LineMatch>>,
    abridged: AtomicBool,
    more_link: Option<WebLink>,
}

impl FileMatch {
    pub fn new(directory: String, filename: String, xref_link: Option<WebLink>) -> Self {
        Self {
            directory,
            filename,
            xref_link,
            lines: Mutex::new(BTreeMap::new()),
            abridged: AtomicBool::new(false),
            more_link: None,
        }
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Directory and filename concatenated; unique across a search result
    pub fn full_path(&self) -> String {
        format!("{}{}", self.directory, self.filename)
    }

    pub fn xref_link(&self) -> Option<&WebLink> {
        self.xref_link.as_ref()
    }

    /// Returns a snapshot of the matched lines in ascending line number order
    ///
    /// Safe to call while a crawl is still appending lines. If the match is abridged
    /// the snapshot may be incomplete.
    pub fn lines(&self) -> Vec<LineMatch> {
        self.lines.lock().values().cloned().collect()
    }

    pub fn line_count(&self) -> usize {
        self.lines.lock().len()
    }

    /// Returns true if the result page indicated more matching lines than it listed
    /// and those have not been fetched yet
    pub fn is_abridged(&self) -> bool {
        self.abridged.load(Ordering::Acquire)
    }

    /// Link to the page listing all matching lines of an abridged file
    pub fn more_link(&self) -> Option<&WebLink> {
        self.more_link.as_ref()
    }

    /// Adds a line unless a line with the same number is already present
    ///
    /// Returns true if the line was added.
    pub fn add_line(&self, line: LineMatch) -> bool {
        let mut lines = self.lines.lock();
        if lines.contains_key(&line.line_number) {
            return false;
        }
        lines.insert(line.line_number, line);
        true
    }

    /// Merges the lines of another match for the same file into this one
    ///
    /// Only line numbers not already present are taken over. Returns the number of
    /// lines added.
    pub fn merge(&self, other: FileMatch) -> usize {
        let incoming = other.lines.into_inner();
        let mut lines = self.lines.lock();
        let mut added = 0;
        for (number, line) in incoming {
            if let std::collections::btree_map::Entry::Vacant(slot) = lines.entry(number) {
                slot.insert(line);
                added += 1;
            }
        }
        added
    }

    pub(crate) fn set_abridged(&mut self, more_link: Option<WebLink>) {
        self.more_link = more_link;
        self.abridged.store(true, Ordering::Release);
    }

    pub(crate) fn set_unabridged(&self) {
        self.abridged.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for FileMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMatch")
            .field("directory", &self.directory)
            .field("filename", &self.filename)
            .field("lines", &self.line_count())
            .field("abridged", &self.is_abridged())
            .finish()
    }
}
