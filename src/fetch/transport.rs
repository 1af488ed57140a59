//! HTTP transport
//!
//! This module owns the single `reqwest` client used for every request:
//! - Building the client with the identifying user agent string
//! - Plain GET requests for direct fetches and robots.txt
//! - JSON POST requests for proxy commands

use crate::config::{HttpConfig, UserAgentConfig};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response body as text
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `http` - Transport timeouts
///
/// # Example
///
/// ```no_run
/// use polite_fetch::config::{HttpConfig, UserAgentConfig};
/// use polite_fetch::fetch::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    http: &HttpConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(http.timeout_secs))
        .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Thin wrapper over a shared `reqwest::Client`
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Wraps an already configured client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a transport from configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        http: &HttpConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent, http)?))
    }

    /// Sends a GET request and reads the body, whatever the status
    pub async fn get(&self, url: &str) -> Result<TransportResponse, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }

    /// POSTs a JSON body and reads the response body, whatever the status
    ///
    /// The FlareSolverr API reports failures with a 500 status and a JSON
    /// envelope, so status interpretation is left to the caller.
    pub async fn post_json<B>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<TransportResponse, reqwest::Error>
    where
        B: Serialize + ?Sized,
    {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}
