//! FlareSolverr-compatible wire format
//!
//! Commands are POSTed as JSON objects tagged by `cmd`; every reply carries a
//! `status` of `"ok"` or `"error"` plus command-specific fields.

use serde::{Deserialize, Serialize};

/// A command sent to the proxy endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cmd")]
pub enum ProxyCommand<'a> {
    #[serde(rename = "sessions.create")]
    CreateSession,

    #[serde(rename = "request.get")]
    Get {
        url: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<&'a str>,
        /// Milliseconds the proxy may spend solving the page
        #[serde(rename = "maxTimeout")]
        max_timeout: u64,
    },
}

/// Outcome marker present on every reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

/// Reply envelope shared by all commands
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyReply {
    pub status: ReplyStatus,
    #[serde(default)]
    pub message: Option<String>,
    /// Set by `sessions.create`
    #[serde(default)]
    pub session: Option<String>,
    /// Set by `request.get`
    #[serde(default)]
    pub solution: Option<Solution>,
}

/// Rendered page returned by `request.get`
#[derive(Debug, Clone, Deserialize)]
pub struct Solution {
    #[serde(default)]
    pub response: Option<String>,
}

impl ProxyReply {
    /// Parses a reply body
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn is_error(&self) -> bool {
        self.status == ReplyStatus::Error
    }

    /// The error message, or a placeholder when the proxy sent none
    pub fn error_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "unknown proxy error".to_string())
    }

    /// Whether the error concerns the session rather than the page
    pub fn is_session_error(&self) -> bool {
        self.is_error()
            && self
                .message
                .as_deref()
                .is_some_and(|m| m.contains("session"))
    }

    /// Consumes the reply and returns the page body, if present and non-empty
    pub fn into_page(self) -> Option<String> {
        self.solution
            .and_then(|s| s.response)
            .filter(|body| !body.is_empty())
    }
}
