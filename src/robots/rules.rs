//! Robots.txt rule set
//!
//! Matching is delegated to the robotstxt crate (a port of Google's matcher).

use robotstxt::DefaultMatcher;

/// Rules loaded from a site's robots.txt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotsRules {
    /// Raw robots.txt body; `None` means every path is allowed
    body: Option<String>,
}

impl RobotsRules {
    /// Wraps a robots.txt body
    pub fn from_body(body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            body: (!body.trim().is_empty()).then_some(body),
        }
    }

    /// Rules for a site without a robots.txt
    pub fn permissive() -> Self {
        Self { body: None }
    }

    pub fn is_permissive(&self) -> bool {
        self.body.is_none()
    }

    /// Checks whether `product_token` may fetch `url`
    ///
    /// `url` may be absolute or a bare path.
    pub fn allows(&self, url: &str, product_token: &str) -> bool {
        match &self.body {
            None => true,
            Some(body) => {
                DefaultMatcher::default().one_agent_allowed_by_robots(body, product_token, url)
            }
        }
    }
}
