/// Crawl state definitions for tracking the progress of a search run
///
/// This module defines the states a coordinator moves through while running a query.
use std::fmt;

/// Represents the current state of a search run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlState {
    // ===== Idle =====
    /// No query has been started yet
    #[default]
    Idle,

    // ===== Active States =====
    /// Resolving redirects of the configured entry URL
    ResolvingRedirect,

    /// Fetching result pages
    CrawlingPages,

    /// Fetching full line lists between result pages
    FetchingLines,

    /// Fetching full line lists after all result pages are done
    FetchingLinesDeferred,

    // ===== Terminal States =====
    /// The run finished; it may have hit the page limit or been aborted
    Done,

    /// The run failed with a transport or parse error
    Failed,
}

impl CrawlState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true while a run is in progress
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::ResolvingRedirect
                | Self::CrawlingPages
                | Self::FetchingLines
                | Self::FetchingLinesDeferred
        )
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    ///
    /// Any state can fail. A new run may start from idle or from a terminal state.
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        use CrawlState::*;

        if next == Failed {
            return *self != Idle;
        }

        matches!(
            (self, next),
            (Idle | Done | Failed, ResolvingRedirect)
                | (ResolvingRedirect, CrawlingPages)
                | (CrawlingPages, FetchingLines)
                | (FetchingLines, CrawlingPages)
                | (CrawlingPages | FetchingLines, FetchingLinesDeferred)
                | (CrawlingPages | FetchingLines | FetchingLinesDeferred, Done)
        )
    }

    /// Short lowercase name, used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ResolvingRedirect => "resolving_redirect",
            Self::CrawlingPages => "crawling_pages",
            Self::FetchingLines => "fetching_lines",
            Self::FetchingLinesDeferred => "fetching_lines_deferred",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
