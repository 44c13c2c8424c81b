//! Ogre-Scrape: a result crawler for OpenGrok code search servers
//!
//! This crate issues a query against an OpenGrok installation, walks all of the
//! paginated result pages, and assembles a deduplicated collection of file matches
//! together with the lines that matched and the highlighted spans within them.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Ogre-Scrape operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Error executing search query: HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Error executing search query: malformed document from {url}: {message}")]
    Document { url: String, message: String },

    #[error("Error parsing XHTML response: {0}")]
    Parse(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Query contains no search terms")]
    EmptyQuery,

    #[error("A query is already running on this coordinator")]
    AlreadyRunning,

    #[error("Search task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("No server named '{0}' in config")]
    UnknownServer(String),
}

/// Result type alias for Ogre-Scrape operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, CrawlSettings, ServerConfig};
pub use crawler::{CancelHandle, Coordinator, SearchHandle};
pub use output::{Phase, ProgressListener, ResultReceiver};
pub use state::{CrawlState, FileMatch, Highlight, LineMatch, SearchResult};
pub use url::{QueryFields, WebLink};
