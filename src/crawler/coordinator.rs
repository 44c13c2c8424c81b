//! Crawler coordinator - main search orchestration logic
//!
//! This module contains the crawl loop of a search run:
//! - Resolving the canonical base URL and building the search URL
//! - Fetching result pages one at a time until none are left, the page limit
//!   is reached, or the run is cancelled
//! - Merging the matches of each page into the `SearchResult`
//! - Fetching the full line lists of abridged files, either after each page
//!   or once at the end
//! - Reporting progress and partial results to registered listeners
//!
//! A coordinator runs at most one search at a time. Requests are strictly
//! sequential; there is no parallel fan-out.

use crate::config::CrawlSettings;
use crate::crawler::fetcher::{self, FetchResponse, FetchedPage};
use crate::crawler::parser::{ResultPage, ResultParser};
use crate::output::{EventRegistry, Phase, ProgressListener, ResultReceiver};
use crate::state::{CrawlState, LineMatch, Merged, SearchResult};
use crate::url::{search_url, QueryFields, WebLink};
use crate::{Result, ScrapeError};
use parking_lot::Mutex;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Cooperative cancellation flag shared between a coordinator and its callers
///
/// Cancellation is checked before each page fetch and before each line fetch.
/// A request that is already in flight always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Requests cancellation of the running search; calling it again has no effect
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Handle to a search running in the background
pub struct SearchHandle {
    cancel: CancelHandle,
    task: JoinHandle<Result<SearchResult>>,
}

impl SearchHandle {
    /// Requests cancellation of the search
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the search to finish
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResult)` - The search completed, possibly cancelled or limited
    /// * `Err(ScrapeError)` - The search failed; partial results are discarded
    pub async fn wait(self) -> Result<SearchResult> {
        self.task.await?
    }
}

/// Clears the running flag when a search ends, however it ends
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Main search coordinator structure
pub struct Coordinator {
    settings: CrawlSettings,
    client: Client,
    events: EventRegistry,
    cancel: CancelHandle,
    running: Arc<AtomicBool>,
    state: Mutex<CrawlState>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `settings` - Server, proxy, page limit and line fetching settings
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(ScrapeError::Client)` - Failed to build the HTTP client
    pub fn new(settings: CrawlSettings) -> Result<Self> {
        let client = fetcher::build_http_client(settings.proxy.as_ref())?;

        Ok(Self {
            settings,
            client,
            events: EventRegistry::new(),
            cancel: CancelHandle::default(),
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(CrawlState::Idle),
        })
    }

    pub fn add_progress_listener(&mut self, listener: Arc<dyn ProgressListener>) {
        self.events.add_progress_listener(listener);
    }

    pub fn add_result_receiver(&mut self, receiver: Arc<dyn ResultReceiver>) {
        self.events.add_result_receiver(receiver);
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Returns a handle that cancels whatever search this coordinator is running
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Requests cancellation of the running search
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> CrawlState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs a search to completion on the current task
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResult)` - The search completed
    /// * `Err(ScrapeError::EmptyQuery)` - No search field is filled in
    /// * `Err(ScrapeError::AlreadyRunning)` - Another search is running
    /// * `Err(ScrapeError)` - A request or parse failed
    pub async fn search(&self, query: &QueryFields) -> Result<SearchResult> {
        let _guard = self.begin(query)?;
        self.run(query).await
    }

    /// Starts a search on a background task and returns immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>, query: QueryFields) -> Result<SearchHandle> {
        let guard = self.begin(&query)?;
        let this = Arc::clone(self);

        let task = tokio::spawn(async move {
            let _guard = guard;
            this.run(&query).await
        });

        Ok(SearchHandle {
            cancel: self.cancel.clone(),
            task,
        })
    }

    fn begin(&self, query: &QueryFields) -> Result<RunGuard> {
        if !query.has_search_terms() {
            return Err(ScrapeError::EmptyQuery);
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ScrapeError::AlreadyRunning);
        }

        self.cancel.reset();
        Ok(RunGuard(Arc::clone(&self.running)))
    }

    async fn run(&self, query: &QueryFields) -> Result<SearchResult> {
        match self.crawl(query).await {
            Ok(result) => {
                self.transition(CrawlState::Done);
                tracing::info!(
                    "Search finished: {} pages fetched, {} directories, {} files, {} lines{}{}",
                    result.fetched_page_count(),
                    result.dir_count(),
                    result.file_count(),
                    result.line_count(),
                    if result.page_limit_triggered() {
                        ", page limit reached"
                    } else {
                        ""
                    },
                    if result.aborted() { ", aborted" } else { "" }
                );
                Ok(result)
            }
            Err(e) => {
                self.transition(CrawlState::Failed);
                tracing::error!("Search failed: {}", e);
                Err(e)
            }
        }
    }

    async fn crawl(&self, query: &QueryFields) -> Result<SearchResult> {
        self.transition(CrawlState::ResolvingRedirect);

        let entry = WebLink::new(self.settings.base_url.clone());
        let base = if self.settings.page_limit == Some(0) {
            tracing::debug!("Page limit is zero, not contacting {}", entry.url);
            entry
        } else {
            fetcher::resolve_redirect(&self.client, &entry).await?
        };

        let start = search_url(&base.url, query)?;
        tracing::info!("Searching {}", start);

        let mut result = SearchResult::new(WebLink::new(start));
        self.transition(CrawlState::CrawlingPages);

        let mut current = 0;
        let mut page_count = 0;

        while !self.cancel.is_cancelled() && self.settings.below_page_limit(page_count) {
            let Some(page_link) = result.next_page().cloned() else {
                break;
            };

            self.events
                .notify_progress(Phase::PageFetch, current, self.pending_requests(&result));
            current += 1;
            page_count += 1;

            let fetched = fetcher::fetch_page(&self.client, &page_link).await?;
            let page = parse_result_page(&fetched)?;
            result.notify_fetched(&page);
            self.merge_page(&mut result, page);

            if self.settings.fetch_lines && !self.settings.fetch_lines_last {
                let fetched_any = self
                    .fetch_abridged_lines(&mut result, &mut current, CrawlState::FetchingLines)
                    .await?;
                if fetched_any {
                    self.transition(CrawlState::CrawlingPages);
                }
            }
        }

        if self.settings.fetch_lines && self.settings.fetch_lines_last {
            let deferred = CrawlState::FetchingLinesDeferred;
            self.fetch_abridged_lines(&mut result, &mut current, deferred)
                .await?;
        }

        let limit_reached = !self.settings.below_page_limit(page_count);
        result.set_page_limit_triggered(result.next_page().is_some() && limit_reached);
        result.set_aborted(self.cancel.is_cancelled());

        Ok(result)
    }

    /// Merges the matches of one page, reporting new files as one batch
    fn merge_page(&self, result: &mut SearchResult, page: ResultPage) {
        let mut new_matches = Vec::new();

        for file_match in page.file_matches {
            match result.merge_file_match(file_match) {
                Merged::New(m) => new_matches.push(m),
                Merged::Amended {
                    existing,
                    lines_added,
                } => {
                    tracing::debug!(
                        "{} seen again, {} lines added",
                        existing.full_path(),
                        lines_added
                    );
                    self.events.notify_new_line_matches(&existing);
                }
            }
        }

        self.events.notify_new_file_matches(&new_matches);
        self.notify_counts(result);
    }

    /// Fetches the full line lists of all abridged files known so far
    ///
    /// Moves to `phase` before the first fetch. Returns true if any line list
    /// was fetched.
    async fn fetch_abridged_lines(
        &self,
        result: &mut SearchResult,
        current: &mut usize,
        phase: CrawlState,
    ) -> Result<bool> {
        let mut pending = result.unfetched_page_count() + result.abridged_file_count();
        let mut fetched_any = false;

        while !self.cancel.is_cancelled() {
            let Some(file_match) = result.next_abridged_file() else {
                break;
            };

            let Some(more_link) = file_match.more_link().cloned() else {
                tracing::warn!(
                    "No usable link to all lines of {}, keeping it abridged",
                    file_match.full_path()
                );
                result.skip_abridged_file();
                pending = pending.saturating_sub(1);
                continue;
            };

            if !fetched_any {
                self.transition(phase);
                fetched_any = true;
            }

            self.events.notify_progress(Phase::LineFetch, *current, pending);
            *current += 1;
            pending = pending.saturating_sub(1);

            let fetched = fetcher::fetch_page(&self.client, &more_link).await?;
            let lines = parse_more_page(&fetched)?;
            let added = result.merge_lines(&file_match, lines);
            tracing::debug!("{}: {} more lines", file_match.full_path(), added);

            self.events.notify_new_line_matches(&file_match);
            self.notify_counts(result);
        }

        Ok(fetched_any)
    }

    /// Requests known to be outstanding
    fn pending_requests(&self, result: &SearchResult) -> usize {
        let mut pending = result.unfetched_page_count();
        if self.settings.fetch_lines {
            pending += result.abridged_file_count();
        }
        pending
    }

    fn notify_counts(&self, result: &SearchResult) {
        self.events
            .notify_counts(result.dir_count(), result.file_count(), result.line_count());
    }

    fn transition(&self, next: CrawlState) {
        let mut state = self.state.lock();
        if *state == next {
            return;
        }
        if state.can_transition_to(next) {
            tracing::debug!("Search state {} -> {}", *state, next);
        } else {
            tracing::warn!("Unexpected search state change {} -> {}", *state, next);
        }
        *state = next;
    }
}

// The parsed document is not Send, so it must not live across an await point.

fn parse_result_page(fetched: &FetchedPage) -> Result<ResultPage> {
    let response = FetchResponse::parse(fetched)?;
    ResultParser::new(&response).parse_page()
}

fn parse_more_page(fetched: &FetchedPage) -> Result<Vec<LineMatch>> {
    let response = FetchResponse::parse(fetched)?;
    ResultParser::new(&response).parse_more()
}
