//! Robots.txt guard for a single site

use crate::fetch::HttpTransport;
use crate::robots::{PermissionOracle, RobotsRules};
use crate::RobotsError;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use url::Url;

/// Loads one site's robots.txt on first use and answers permission queries
///
/// The rule set is fetched at most once per guard. Concurrent first loads
/// share a single request.
///
/// # Status Handling
///
/// | robots.txt response | Result |
/// |---------------------|--------|
/// | 2xx | Rules parsed from the body |
/// | 4xx | Everything allowed |
/// | 5xx | `RobotsError::ServerError` |
/// | Network failure | `RobotsError::Fetch` |
pub struct RobotsGuard {
    transport: HttpTransport,
    robots_url: Url,
    product_token: String,
    rules: OnceCell<RobotsRules>,
}

impl RobotsGuard {
    /// Creates a guard for the site at `base`
    ///
    /// # Arguments
    ///
    /// * `transport` - Transport used to fetch robots.txt
    /// * `base` - Any URL on the site; only its origin is used
    /// * `product_token` - The agent name matched against `User-agent` groups
    pub fn new(
        transport: HttpTransport,
        base: &Url,
        product_token: impl Into<String>,
    ) -> Result<Self, RobotsError> {
        let robots_url = base
            .join("/robots.txt")
            .map_err(|e| RobotsError::InvalidUrl(format!("{}: {}", base, e)))?;

        Ok(Self {
            transport,
            robots_url,
            product_token: product_token.into(),
            rules: OnceCell::new(),
        })
    }

    pub fn robots_url(&self) -> &Url {
        &self.robots_url
    }

    /// The loaded rules, if any
    pub fn rules(&self) -> Option<&RobotsRules> {
        self.rules.get()
    }

    async fn fetch_rules(&self) -> Result<RobotsRules, RobotsError> {
        let url = self.robots_url.as_str();
        tracing::info!("Loading robots.txt from {}", url);

        let response = self
            .transport
            .get(url)
            .await
            .map_err(|source| RobotsError::Fetch {
                url: url.to_string(),
                source,
            })?;

        if response.status.is_success() {
            Ok(RobotsRules::from_body(response.body))
        } else if response.status.is_client_error() {
            tracing::info!(
                "No robots.txt at {} (HTTP {}), allowing all paths",
                url,
                response.status
            );
            Ok(RobotsRules::permissive())
        } else {
            Err(RobotsError::ServerError {
                url: url.to_string(),
                status: response.status,
            })
        }
    }
}

#[async_trait]
impl PermissionOracle for RobotsGuard {
    fn is_loaded(&self) -> bool {
        self.rules.initialized()
    }

    async fn load(&self) -> Result<(), RobotsError> {
        self.rules.get_or_try_init(|| self.fetch_rules()).await?;
        Ok(())
    }

    fn is_allowed(&self, url: &str) -> bool {
        match self.rules.get() {
            Some(rules) => rules.allows(url, &self.product_token),
            None => {
                tracing::warn!("robots.txt not loaded yet, refusing {}", url);
                false
            }
        }
    }
}
