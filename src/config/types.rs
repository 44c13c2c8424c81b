use serde::Deserialize;
use url::Url;

/// Default page limit of a `CrawlSettings` built in code
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Main configuration structure: a list of server presets
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(rename = "server", default)]
    pub servers: Vec<ServerConfig>,
}

impl Config {
    /// Looks up a server preset by name
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }
}

/// Settings for one OpenGrok installation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Name the preset is selected by
    pub name: String,

    /// Entry URL of the OpenGrok web application
    pub base_url: String,

    /// HTTP proxy host; empty or absent means no proxy
    #[serde(default)]
    pub proxy_host: Option<String>,

    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,

    /// Whether `page_limit` applies at all
    #[serde(default = "default_true")]
    pub limit_pages: bool,

    /// Maximum number of result pages to fetch; zero or less fetches none
    #[serde(default = "default_page_limit")]
    pub page_limit: i64,

    /// Fetch the complete line list of abridged files
    #[serde(default = "default_true")]
    pub fetch_lines: bool,

    /// Fetch the line lists only after all result pages
    #[serde(default = "default_true")]
    pub fetch_lines_last: bool,
}

fn default_proxy_port() -> u16 {
    8080
}

fn default_page_limit() -> i64 {
    15
}

fn default_true() -> bool {
    true
}

impl ServerConfig {
    /// The proxy to use, if a proxy host is set
    pub fn proxy(&self) -> Option<ProxyConfig> {
        let host = self.proxy_host.as_deref().map(str::trim).unwrap_or("");
        if host.is_empty() {
            return None;
        }
        Some(ProxyConfig {
            host: host.to_string(),
            port: self.proxy_port,
        })
    }

    /// Converts the preset into the settings a coordinator runs with
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSettings)` - Settings for this server
    /// * `Err(url::ParseError)` - The base URL does not parse
    pub fn crawl_settings(&self) -> Result<CrawlSettings, url::ParseError> {
        let page_limit = if self.limit_pages {
            Some(usize::try_from(self.page_limit.max(0)).unwrap_or(usize::MAX))
        } else {
            None
        };

        Ok(CrawlSettings {
            base_url: Url::parse(self.base_url.trim())?,
            proxy: self.proxy(),
            page_limit,
            fetch_lines: self.fetch_lines,
            fetch_lines_last: self.fetch_lines_last,
        })
    }
}

/// HTTP proxy address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    /// Proxy URL in the form reqwest expects
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::str::FromStr for ProxyConfig {
    type Err = String;

    /// Parses `HOST:PORT`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| format!("expected HOST:PORT, got '{}'", s))?;

        if host.is_empty() {
            return Err(format!("missing proxy host in '{}'", s));
        }

        let port: u16 = port
            .parse()
            .map_err(|e| format!("invalid proxy port '{}': {}", port, e))?;
        if port == 0 {
            return Err("proxy port must not be zero".to_string());
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// Settings of a coordinator
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Entry URL of the OpenGrok web application
    pub base_url: Url,

    pub proxy: Option<ProxyConfig>,

    /// Maximum number of result pages to fetch; `None` means no limit
    pub page_limit: Option<usize>,

    /// Fetch the complete line list of abridged files
    pub fetch_lines: bool,

    /// Fetch line lists after all result pages instead of after each page
    pub fetch_lines_last: bool,
}

impl CrawlSettings {
    /// Settings with the default page limit and deferred line fetching
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            proxy: None,
            page_limit: Some(DEFAULT_PAGE_LIMIT),
            fetch_lines: true,
            fetch_lines_last: true,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_page_limit(mut self, page_limit: Option<usize>) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn with_fetch_lines(mut self, fetch_lines: bool) -> Self {
        self.fetch_lines = fetch_lines;
        self
    }

    pub fn with_fetch_lines_last(mut self, fetch_lines_last: bool) -> Self {
        self.fetch_lines_last = fetch_lines_last;
        self
    }

    /// True if another page may be fetched after `fetched` pages
    pub fn below_page_limit(&self, fetched: usize) -> bool {
        self.page_limit.map_or(true, |limit| fetched < limit)
    }
}
