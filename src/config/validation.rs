use crate::config::types::{Config, ServerConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for server in &config.servers {
        validate_server(server)?;

        if !names.insert(server.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate server name '{}'",
                server.name
            )));
        }
    }

    Ok(())
}

/// Validates a single server preset
fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "Server name cannot be empty".to_string(),
        ));
    }

    validate_base_url(&server.name, &server.base_url)?;

    if server.proxy().is_some() && server.proxy_port == 0 {
        return Err(ConfigError::Validation(format!(
            "Server '{}': proxy-port must be between 1 and 65535",
            server.name
        )));
    }

    Ok(())
}

/// Validates the base URL of a server: it must parse and use http or https
fn validate_base_url(name: &str, base_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(base_url.trim()).map_err(|e| {
        ConfigError::InvalidUrl(format!("Server '{}': base-url '{}': {}", name, base_url, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "Server '{}': base-url '{}' must use http or https",
            name, base_url
        )));
    }

    Ok(())
}
