//! Polite-Fetch: a policy-aware page fetcher
//!
//! This crate returns page bodies for URLs while respecting the target site's
//! robots.txt, or routes requests through a FlareSolverr-compatible
//! challenge-solving proxy with managed, reusable sessions.

pub mod config;
pub mod fetch;
pub mod robots;

use std::sync::Arc;
use thiserror::Error;

/// Main error type for fetch operations
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("URL disallowed by robots.txt: {url}")]
    RobotsDisallowed { url: String },

    #[error("Failed to load robots.txt: {0}")]
    PermissionLoad(#[from] RobotsError),

    #[error("Proxy session error: {0}")]
    SessionCreation(#[from] SessionError),

    #[error("Proxy error for {url}: {message}")]
    Proxy { url: String, message: String },

    #[error("Proxy returned invalid response for {url}: {detail}")]
    ProxyProtocol { url: String, detail: String },
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

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Errors raised while acquiring a proxy session
///
/// Cloneable so that every caller waiting on the same creation attempt
/// receives the same failure.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Failed to create proxy session: {0}")]
    Rejected(String),

    #[error("Proxy reported success but returned no session identifier")]
    MissingSession,

    #[error("Malformed session response: {0}")]
    Malformed(String),

    #[error("Session request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        source: Arc<reqwest::Error>,
    },

    #[error("Session creation was abandoned before completing")]
    Abandoned,
}

/// Robots.txt loading errors
#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("Failed to fetch {url}: {source}")]
    Fetch { url: String, source: reqwest::Error },

    #[error("Server error {status} fetching {url}")]
    ServerError {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Invalid robots.txt location: {0}")]
    InvalidUrl(String),
}

/// Result type alias for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for session acquisition
pub type SessionResult<T> = std::result::Result<T, SessionError>;

// Re-export commonly used types
pub use config::{Config, FetchMode, ProxySettings, SessionMode};
pub use fetch::{Dispatcher, HttpTransport, SessionCoordinator, SessionToken};
pub use robots::{PermissionOracle, RobotsGuard};
