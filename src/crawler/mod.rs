//! Crawler module for fetching and processing OpenGrok result pages
//!
//! This module contains the core search logic, including:
//! - Repair of the not quite well-formed markup OpenGrok serves
//! - HTTP fetching with referer forwarding and redirect resolution
//! - Parsing of result pages and full line lists
//! - Overall search coordination

mod coordinator;
mod fetcher;
mod parser;
pub mod repair;

pub use coordinator::{CancelHandle, Coordinator, SearchHandle};
pub use fetcher::{
    build_http_client, fetch_page, resolve_redirect, FetchResponse, FetchedPage, USER_AGENT,
};
pub use parser::{ResultPage, ResultParser};
