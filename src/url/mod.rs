//! URL handling module for Ogre-Scrape
//!
//! This module provides the link type passed between the fetcher, the parser and the
//! page queue, query string construction, and the heuristic that recognizes pager
//! links pointing back at the first result page.

mod query;

pub use query::{search_url, QueryFields};

use url::Url;

/// A hyperlink discovered on a page, together with the page it was found on
///
/// The referer is sent along as the `Referer` header when the link is followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebLink {
    pub url: Url,
    pub referer: Option<Url>,
}

impl WebLink {
    /// Creates a link without a referer
    pub fn new(url: Url) -> Self {
        Self { url, referer: None }
    }

    /// Creates a link that was found on the page at `referer`
    pub fn with_referer(url: Url, referer: Url) -> Self {
        Self {
            url,
            referer: Some(referer),
        }
    }

    /// Resolves `href` relative to `base` and records `base` as the referer
    ///
    /// Returns None if the href cannot be resolved. Callers treat such links as absent
    /// instead of failing the whole page.
    pub fn resolve(base: &Url, href: &str) -> Option<Self> {
        match base.join(href.trim()) {
            Ok(url) => Some(Self::with_referer(url, base.clone())),
            Err(e) => {
                tracing::warn!("Ignoring unresolvable link '{}' on {}: {}", href, base, e);
                None
            }
        }
    }
}

/// Returns true if the URL looks like a pager link back to the first result page
///
/// The first page is always fetched through the plain search URL, so a pager link
/// carrying `start=0` would only revisit it under a different name. This is a plain
/// string match on the serialized URL; it does not inspect the parsed query pairs.
pub fn is_start_page_link(url: &Url) -> bool {
    let s = url.as_str();
    s.contains("start=0&") || s.ends_with("&start=0")
}
