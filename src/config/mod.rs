//! Configuration module for Polite-Fetch
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving the exclusive fetch route (direct or via proxy).
//!
//! # Example
//!
//! ```no_run
//! use polite_fetch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("fetch.toml")).unwrap();
//! println!("Route: {:?}", config.fetch_mode());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchMode, HttpConfig, ProxyConfig, ProxySettings, RobotsConfig, SessionMode,
    UserAgentConfig, DEFAULT_MAX_TIMEOUT_MS,
};

// Re-export parser functions
pub use parser::{apply_env_overrides, config_from_env, load_config, parse_config, PROXY_ENV_VAR};
