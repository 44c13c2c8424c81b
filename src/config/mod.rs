//! Configuration module for Ogre-Scrape
//!
//! This module handles loading, parsing, and validating TOML files of server presets,
//! and the settings a coordinator runs with.
//!
//! # Example
//!
//! ```no_run
//! use ogre_scrape::config::load_server;
//! use std::path::Path;
//!
//! let server = load_server(Path::new("servers.toml"), "illumos").unwrap();
//! let settings = server.crawl_settings().unwrap();
//! println!("Page limit: {:?}", settings.page_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlSettings, ProxyConfig, ServerConfig, DEFAULT_PAGE_LIMIT};

// Re-export parser functions
pub use parser::{load_config, load_server, parse_config};
