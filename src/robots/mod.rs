//! Robots.txt handling module
//!
//! This module provides the permission oracle consulted before direct fetches,
//! and its robots.txt-backed implementation.

mod guard;
mod rules;

pub use guard::RobotsGuard;
pub use rules::RobotsRules;

use crate::RobotsError;
use async_trait::async_trait;

/// Answers whether a URL may be fetched directly
///
/// Implementations load their policy lazily: callers check
/// [`is_loaded`](Self::is_loaded) and call [`load`](Self::load) before the
/// first [`is_allowed`](Self::is_allowed) query.
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    /// Whether the policy has been loaded
    fn is_loaded(&self) -> bool;

    /// Loads the policy; a no-op once loaded
    async fn load(&self) -> Result<(), RobotsError>;

    /// Checks a URL against the loaded policy
    fn is_allowed(&self, url: &str) -> bool;
}
