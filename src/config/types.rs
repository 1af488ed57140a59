use serde::Deserialize;
use url::Url;

/// Default upper bound the proxy may spend solving a single page (milliseconds)
pub const DEFAULT_MAX_TIMEOUT_MS: u64 = 60_000;

/// Main configuration structure for Polite-Fetch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the fetcher, also used as the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the fetcher
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the fetcher
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for fetcher-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: env!("CARGO_PKG_NAME").to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Transport timeouts
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

// The proxy may legitimately hold a request for the full solve timeout.
fn default_timeout_secs() -> u64 {
    90
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Robots.txt settings for the direct path
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RobotsConfig {
    /// Origin whose robots.txt governs direct fetches
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,
}

/// Challenge-solving proxy settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Proxy endpoint; presence selects the proxy path
    pub endpoint: Option<String>,

    #[serde(rename = "session-mode", default)]
    pub session_mode: SessionMode,

    /// Upper bound passed to the proxy for each `request.get` (milliseconds)
    #[serde(rename = "max-timeout-ms", default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            session_mode: SessionMode::default(),
            max_timeout_ms: DEFAULT_MAX_TIMEOUT_MS,
        }
    }
}

fn default_max_timeout_ms() -> u64 {
    DEFAULT_MAX_TIMEOUT_MS
}

/// Whether proxy requests share a persistent browser session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Create one session lazily and reuse it across requests
    #[default]
    Reuse,
    /// Send every request without a session
    Stateless,
}

/// Resolved proxy settings for the proxy path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub endpoint: Url,
    pub session_mode: SessionMode,
    /// Upper bound passed to the proxy for each `request.get` (milliseconds)
    pub max_timeout_ms: u64,
}

impl ProxySettings {
    /// Creates settings for the given endpoint with session reuse and the default timeout
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            session_mode: SessionMode::Reuse,
            max_timeout_ms: DEFAULT_MAX_TIMEOUT_MS,
        }
    }

    pub fn with_session_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = mode;
        self
    }

    pub fn with_max_timeout_ms(mut self, max_timeout_ms: u64) -> Self {
        self.max_timeout_ms = max_timeout_ms;
        self
    }
}

/// The exclusive fetch route chosen once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    /// Fetch directly, gated by the robots.txt of `robots_base`
    Direct { robots_base: Url },
    /// Fetch through the challenge-solving proxy, skipping robots.txt
    ViaProxy(ProxySettings),
}
