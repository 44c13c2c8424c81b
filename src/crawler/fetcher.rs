//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests of a search run:
//! - Building the HTTP client with the crawler's user agent and optional proxy
//! - Resolving redirects of the configured entry URL
//! - Fetching result pages with a `Referer` header
//! - Decoding the response body and handing it to markup repair
//!
//! Fetching and parsing are kept apart: `fetch_page` yields a plain `FetchedPage`
//! that can cross an `.await`, and `FetchResponse::parse` turns it into a document
//! synchronously.

use crate::config::ProxyConfig;
use crate::crawler::repair;
use crate::url::WebLink;
use crate::{Result, ScrapeError};
use reqwest::header::{CONTENT_TYPE, REFERER};
use reqwest::{redirect::Policy, Client};
use scraper::Html;
use url::Url;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("ogre-scrape/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects followed for a single request
const MAX_REDIRECTS: usize = 10;

/// A page body as received from the server
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,
    /// Decoded body text
    pub body: String,
}

/// A repaired and parsed page together with the URL it came from
pub struct FetchResponse {
    pub document: Html,
    pub url: Url,
}

impl FetchResponse {
    /// Repairs and parses a fetched page
    ///
    /// # Returns
    ///
    /// * `Ok(FetchResponse)` - The page is usable as a document
    /// * `Err(ScrapeError::Document)` - The page is not well-formed even after repair
    pub fn parse(page: &FetchedPage) -> Result<Self> {
        let document =
            repair::parse_document(&page.body).map_err(|message| ScrapeError::Document {
                url: page.url.to_string(),
                message,
            })?;

        Ok(Self {
            document,
            url: page.url.clone(),
        })
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `proxy` - HTTP proxy to send all requests through, if any
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    proxy: Option<&ProxyConfig>,
) -> std::result::Result<Client, reqwest::Error> {
    let builder = Client::builder()
        .user_agent(USER_AGENT)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    // Without an explicit proxy, do not pick one up from the environment either
    let builder = match proxy {
        Some(proxy) => builder.proxy(reqwest::Proxy::all(proxy.url())?),
        None => builder.no_proxy(),
    };

    builder.build()
}

/// Fetches a page and decodes its body
///
/// The link's referer, if any, is sent as the `Referer` header. Redirects are
/// followed. A response status outside 2xx is an error.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `link` - The page to fetch
///
/// # Returns
///
/// * `Ok(FetchedPage)` - The final URL and the decoded body
/// * `Err(ScrapeError::Http)` - The request failed or returned an error status
pub async fn fetch_page(client: &Client, link: &WebLink) -> Result<FetchedPage> {
    tracing::debug!("GET {}", link.url);

    let http_error = |source: reqwest::Error| ScrapeError::Http {
        url: link.url.to_string(),
        source,
    };

    let mut request = client.get(link.url.clone());
    if let Some(referer) = &link.referer {
        request = request.header(REFERER, referer.as_str());
    }

    let response = request
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(http_error)?;

    let url = response.url().clone();
    let charset = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(charset_of)
        .map(str::to_string);

    let bytes = response.bytes().await.map_err(http_error)?;
    tracing::debug!("Received {} bytes from {}", bytes.len(), url);

    Ok(FetchedPage {
        url,
        body: repair::decode(&bytes, charset.as_deref()),
    })
}

/// Follows redirects of the entry URL and returns where they end
///
/// The body of the final page is discarded. Servers commonly redirect the bare
/// installation URL to a trailing-slash form, and relative search URLs must be
/// resolved against that final location.
pub async fn resolve_redirect(client: &Client, link: &WebLink) -> Result<WebLink> {
    let fetched = fetch_page(client, link).await?;

    if fetched.url != link.url {
        tracing::info!("{} redirected to {}", link.url, fetched.url);
    }

    Ok(WebLink {
        url: fetched.url,
        referer: link.referer.clone(),
    })
}

/// Extracts the charset parameter of a Content-Type header value
fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim())
        } else {
            None
        }
    })
}
