use crate::config::types::{Config, ServerConfig};
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use ogre_scrape::config::load_config;
///
/// let config = load_config(Path::new("servers.toml")).unwrap();
/// println!("{} servers configured", config.servers.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads a configuration file and picks one server preset from it
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
/// * `name` - Name of the server preset
///
/// # Returns
///
/// * `Ok(ServerConfig)` - The named preset
/// * `Err(ConfigError::UnknownServer)` - No preset has that name
/// * `Err(ConfigError)` - Failed to load the configuration
pub fn load_server(path: &Path, name: &str) -> Result<ServerConfig, ConfigError> {
    let config = load_config(path)?;
    config
        .server(name)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownServer(name.to_string()))
}
