use crate::config::types::{Config, FetchMode, ProxySettings};
use crate::config::validation::{parse_http_url, validate};
use crate::ConfigError;
use std::path::Path;

/// Environment variable holding the challenge-solving proxy endpoint
pub const PROXY_ENV_VAR: &str = "FLARESOLVERR_URL";

/// Loads and parses a configuration file from the given path
///
/// The proxy endpoint from [`PROXY_ENV_VAR`], when set, takes precedence over
/// the file's `[proxy] endpoint`.
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
/// use polite_fetch::config::load_config;
///
/// let config = load_config(Path::new("fetch.toml")).unwrap();
/// println!("User agent: {}", config.user_agent.header_value());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Builds a configuration from defaults and the process environment only
pub fn config_from_env() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Parses TOML configuration content without touching the environment
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    Ok(config)
}

/// Applies environment overrides using the given variable lookup
///
/// An empty value is treated as unset.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(endpoint) = lookup(PROXY_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        tracing::debug!("Proxy endpoint taken from {}", PROXY_ENV_VAR);
        config.proxy.endpoint = Some(endpoint.trim().to_string());
    }
}

impl Config {
    /// Resolves the exclusive fetch route
    ///
    /// A configured proxy endpoint selects [`FetchMode::ViaProxy`]; otherwise
    /// the direct route requires a robots.txt base URL.
    pub fn fetch_mode(&self) -> Result<FetchMode, ConfigError> {
        if let Some(endpoint) = &self.proxy.endpoint {
            let endpoint = parse_http_url("proxy endpoint", endpoint)?;
            return Ok(FetchMode::ViaProxy(
                ProxySettings::new(endpoint)
                    .with_session_mode(self.proxy.session_mode)
                    .with_max_timeout_ms(self.proxy.max_timeout_ms),
            ));
        }

        match &self.robots.base_url {
            Some(base) => Ok(FetchMode::Direct {
                robots_base: parse_http_url("robots base-url", base)?,
            }),
            None => Err(ConfigError::Validation(
                "robots base-url is required when no proxy endpoint is configured".to_string(),
            )),
        }
    }
}
