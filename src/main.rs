//! Ogre-Scrape main entry point
//!
//! This is the command-line interface for searching OpenGrok servers.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{ArgGroup, Parser};
use ogre_scrape::config::{load_server, CrawlSettings, ProxyConfig};
use ogre_scrape::output::{
    print_result_tree, print_statistics, write_markdown_report, LoggingListener, ReportInfo,
    SearchStatistics,
};
use ogre_scrape::{Coordinator, QueryFields};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Ogre-Scrape: collects all results of an OpenGrok search
///
/// Runs one query against an OpenGrok server, follows the result pages, and
/// fetches the full line lists of files the result pages only show partially.
/// Press Ctrl-C to stop after the current request and print what was found.
#[derive(Parser, Debug)]
#[command(name = "ogre-scrape")]
#[command(version)]
#[command(about = "Collects all results of an OpenGrok search", long_about = None)]
#[command(group(ArgGroup::new("target").required(true).args(["config", "url"])))]
struct Cli {
    /// TOML file with server presets
    #[arg(long, value_name = "FILE", requires = "server")]
    config: Option<PathBuf>,

    /// Name of the server preset to use
    #[arg(long, value_name = "NAME", requires = "config")]
    server: Option<String>,

    /// Entry URL of the OpenGrok installation
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// HTTP proxy to send requests through
    #[arg(long, value_name = "HOST:PORT")]
    proxy: Option<ProxyConfig>,

    /// Full text search
    #[arg(short, long)]
    text: Option<String>,

    /// Definition search
    #[arg(short, long)]
    defs: Option<String>,

    /// Symbol reference search
    #[arg(short, long)]
    refs: Option<String>,

    /// File path search
    #[arg(short, long)]
    path: Option<String>,

    /// History log search
    #[arg(long)]
    hist: Option<String>,

    /// Project to search in
    #[arg(long)]
    project: Option<String>,

    /// Maximum number of result pages to fetch
    #[arg(long, value_name = "N", conflicts_with = "no_page_limit")]
    page_limit: Option<usize>,

    /// Fetch all result pages
    #[arg(long)]
    no_page_limit: bool,

    /// Do not fetch the full line lists of abridged files
    #[arg(long)]
    no_fetch_lines: bool,

    /// Fetch line lists after each result page instead of at the end
    #[arg(long, conflicts_with = "no_fetch_lines")]
    interleave_lines: bool,

    /// Write a markdown report to this file
    #[arg(long, value_name = "FILE")]
    markdown: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn query(&self) -> QueryFields {
        QueryFields {
            text: self.text.clone(),
            defs: self.defs.clone(),
            refs: self.refs.clone(),
            path: self.path.clone(),
            hist: self.hist.clone(),
            project: self.project.clone(),
        }
    }

    /// Settings from the server preset or URL, overridden by command-line flags
    fn crawl_settings(&self) -> anyhow::Result<CrawlSettings> {
        let mut settings = match (&self.config, &self.url) {
            (Some(path), _) => {
                let name = self
                    .server
                    .as_deref()
                    .context("--server is required with --config")?;
                let server = load_server(path, name)
                    .with_context(|| format!("Failed to load server '{}'", name))?;
                server.crawl_settings()?
            }
            (None, Some(url)) => {
                let url = Url::parse(url).with_context(|| format!("Invalid URL '{}'", url))?;
                CrawlSettings::new(url)
            }
            (None, None) => bail!("Either --config or --url is required"),
        };

        if let Some(proxy) = &self.proxy {
            settings.proxy = Some(proxy.clone());
        }
        if self.no_page_limit {
            settings.page_limit = None;
        } else if let Some(limit) = self.page_limit {
            settings.page_limit = Some(limit);
        }
        if self.no_fetch_lines {
            settings.fetch_lines = false;
        }
        if self.interleave_lines {
            settings.fetch_lines_last = false;
        }

        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let settings = cli.crawl_settings()?;
    let query = cli.query();

    tracing::info!(
        "Server: {}, page limit: {}, line fetching: {}",
        settings.base_url,
        settings
            .page_limit
            .map_or_else(|| "none".to_string(), |n| n.to_string()),
        match (settings.fetch_lines, settings.fetch_lines_last) {
            (false, _) => "off",
            (true, true) => "deferred",
            (true, false) => "interleaved",
        }
    );

    let mut coordinator = Coordinator::new(settings.clone())?;
    coordinator.add_progress_listener(Arc::new(LoggingListener));
    let coordinator = Arc::new(coordinator);

    let started_at = Utc::now();
    let handle = coordinator.start(query.clone())?;

    let cancel = handle.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current request");
            cancel.cancel();
        }
    });

    let result = handle.wait().await.context("Search failed")?;
    let finished_at = Utc::now();

    print_result_tree(&result);
    println!();
    print_statistics(&SearchStatistics::from_result(&result));

    if let Some(path) = &cli.markdown {
        let info = ReportInfo {
            server: settings.base_url.to_string(),
            query: query.to_query_string(),
            started_at,
            finished_at,
        };
        write_markdown_report(&info, &result, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ogre_scrape=info,warn"),
            1 => EnvFilter::new("ogre_scrape=debug,info"),
            2 => EnvFilter::new("ogre_scrape=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}
