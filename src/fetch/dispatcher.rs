//! Fetch dispatcher
//!
//! The [`Dispatcher`] is the public entry point. It routes every call down the
//! single path chosen at construction:
//!
//! - **Proxy**: acquire a session, send `request.get`, retry once with a fresh
//!   session when the proxy reports a session problem. robots.txt is not
//!   consulted; the proxy applies its own access policy.
//! - **Direct**: load robots.txt on first use, refuse disallowed URLs, then GET.

use crate::config::{Config, FetchMode, ProxySettings, SessionMode};
use crate::fetch::protocol::{ProxyCommand, ProxyReply};
use crate::fetch::session::{SessionCoordinator, SessionToken};
use crate::fetch::transport::HttpTransport;
use crate::robots::{PermissionOracle, RobotsGuard};
use crate::FetchError;
use std::sync::Arc;

enum Route {
    Proxy {
        settings: ProxySettings,
        sessions: Arc<SessionCoordinator>,
    },
    Direct {
        oracle: Arc<dyn PermissionOracle>,
    },
}

/// Returns page bodies for URLs over the configured route
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```no_run
/// use polite_fetch::config::config_from_env;
/// use polite_fetch::Dispatcher;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = config_from_env()?;
/// config.robots.base_url = Some("https://example.com".to_string());
///
/// let dispatcher = Dispatcher::from_config(&config)?;
/// let body = dispatcher.fetch("https://example.com/").await?;
/// println!("{} bytes", body.len());
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    transport: HttpTransport,
    route: Route,
}

impl Dispatcher {
    /// Builds the transport, oracle, and session coordinator from configuration
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let transport = HttpTransport::from_config(&config.user_agent, &config.http)
            .map_err(crate::ConfigError::from)?;

        match config.fetch_mode()? {
            FetchMode::ViaProxy(settings) => Ok(Self::via_proxy(transport, settings)),
            FetchMode::Direct { robots_base } => {
                let guard = RobotsGuard::new(
                    transport.clone(),
                    &robots_base,
                    config.user_agent.crawler_name.clone(),
                )?;
                Ok(Self::direct(transport, Arc::new(guard)))
            }
        }
    }

    /// Routes every fetch through the challenge-solving proxy
    pub fn via_proxy(transport: HttpTransport, settings: ProxySettings) -> Self {
        tracing::debug!(
            "Fetching via proxy {} ({:?} sessions)",
            settings.endpoint,
            settings.session_mode
        );
        let sessions = Arc::new(SessionCoordinator::new(
            transport.clone(),
            settings.endpoint.clone(),
        ));
        Self::with_sessions(transport, settings, sessions)
    }

    /// Routes through the proxy using an existing session coordinator
    pub fn with_sessions(
        transport: HttpTransport,
        settings: ProxySettings,
        sessions: Arc<SessionCoordinator>,
    ) -> Self {
        Self {
            transport,
            route: Route::Proxy { settings, sessions },
        }
    }

    /// Fetches directly, gated by the given permission oracle
    pub fn direct(transport: HttpTransport, oracle: Arc<dyn PermissionOracle>) -> Self {
        tracing::debug!("Fetching directly with robots.txt checks");
        Self {
            transport,
            route: Route::Direct { oracle },
        }
    }

    /// The session coordinator, when routing through the proxy
    pub fn sessions(&self) -> Option<&Arc<SessionCoordinator>> {
        match &self.route {
            Route::Proxy { sessions, .. } => Some(sessions),
            Route::Direct { .. } => None,
        }
    }

    pub fn is_proxied(&self) -> bool {
        matches!(self.route, Route::Proxy { .. })
    }

    /// Fetches a page body
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |-----------|-------|
    /// | Session could not be created | `SessionCreation` |
    /// | Proxy reported an error (after at most one session retry) | `Proxy` |
    /// | Proxy reply lacks a non-empty `solution.response` or is not JSON | `ProxyProtocol` |
    /// | robots.txt could not be loaded | `PermissionLoad` |
    /// | URL disallowed by robots.txt | `RobotsDisallowed` |
    /// | Direct GET returned a non-success status | `HttpStatus` |
    /// | Network failure | `Http` |
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        match &self.route {
            Route::Proxy { settings, sessions } => {
                self.fetch_via_proxy(url, settings, sessions).await
            }
            Route::Direct { oracle } => self.fetch_direct(url, oracle.as_ref()).await,
        }
    }

    async fn fetch_via_proxy(
        &self,
        url: &str,
        settings: &ProxySettings,
        sessions: &SessionCoordinator,
    ) -> Result<String, FetchError> {
        if settings.session_mode == SessionMode::Stateless {
            let reply = self.proxy_get(url, settings, None).await?;
            return into_page(url, reply);
        }

        let session = acquire_session(url, sessions).await?;
        tracing::debug!("Using proxy session {} for {}", session, url);

        let reply = self.proxy_get(url, settings, Some(&session)).await?;
        if !reply.is_session_error() {
            return into_page(url, reply);
        }

        // Sessions can expire on the proxy side; recreate and retry exactly once
        tracing::warn!(
            "Proxy session {} rejected for {} ({}), recreating",
            session,
            url,
            reply.error_message()
        );
        sessions.invalidate();
        let session = acquire_session(url, sessions).await?;

        let retry = self.proxy_get(url, settings, Some(&session)).await?;
        into_page(url, retry)
    }

    async fn proxy_get(
        &self,
        url: &str,
        settings: &ProxySettings,
        session: Option<&SessionToken>,
    ) -> Result<ProxyReply, FetchError> {
        let command = ProxyCommand::Get {
            url,
            session: session.map(SessionToken::as_str),
            max_timeout: settings.max_timeout_ms,
        };

        let response = self
            .transport
            .post_json(settings.endpoint.as_str(), &command)
            .await
            .map_err(|source| {
                tracing::error!("Proxy request for {} failed: {}", url, source);
                FetchError::Http {
                    url: url.to_string(),
                    source,
                }
            })?;

        ProxyReply::parse(&response.body).map_err(|e| {
            tracing::error!("Proxy returned unparsable reply for {}: {}", url, e);
            FetchError::ProxyProtocol {
                url: url.to_string(),
                detail: format!("HTTP {}: {}", response.status, e),
            }
        })
    }

    async fn fetch_direct(
        &self,
        url: &str,
        oracle: &dyn PermissionOracle,
    ) -> Result<String, FetchError> {
        if !oracle.is_loaded() {
            oracle.load().await.map_err(|e| {
                tracing::error!("Could not load robots.txt before fetching {}: {}", url, e);
                FetchError::PermissionLoad(e)
            })?;
        }

        if !oracle.is_allowed(url) {
            tracing::error!("Tried accessing robots.txt disallowed URL ({})", url);
            return Err(FetchError::RobotsDisallowed {
                url: url.to_string(),
            });
        }

        let response = self.transport.get(url).await.map_err(|source| {
            tracing::error!("Request for {} failed: {}", url, source);
            FetchError::Http {
                url: url.to_string(),
                source,
            }
        })?;

        if !response.status.is_success() {
            tracing::error!("HTTP {} for {}", response.status, url);
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        Ok(response.body)
    }
}

async fn acquire_session(
    url: &str,
    sessions: &SessionCoordinator,
) -> Result<SessionToken, FetchError> {
    sessions.acquire().await.map_err(|e| {
        tracing::error!("No proxy session available for {}: {}", url, e);
        FetchError::SessionCreation(e)
    })
}

/// Turns a proxy reply into the page body or the matching error
fn into_page(url: &str, reply: ProxyReply) -> Result<String, FetchError> {
    if reply.is_error() {
        let message = reply.error_message();
        tracing::error!("Proxy error for {}: {}", url, message);
        return Err(FetchError::Proxy {
            url: url.to_string(),
            message,
        });
    }

    reply.into_page().ok_or_else(|| {
        tracing::error!("Proxy returned invalid response for {}", url);
        FetchError::ProxyProtocol {
            url: url.to_string(),
            detail: "missing solution.response".to_string(),
        }
    })
}
