//! Proxy session lifecycle
//!
//! The [`SessionCoordinator`] owns the single cached proxy session and makes
//! sure that concurrent callers asking for a session on a cold start share one
//! `sessions.create` call instead of each issuing their own.

use crate::fetch::protocol::{ProxyCommand, ProxyReply};
use crate::fetch::transport::HttpTransport;
use crate::{SessionError, SessionResult};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use url::Url;

/// Opaque identifier of a live proxy session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A creation attempt other callers can subscribe to
struct PendingCreation {
    generation: u64,
    outcome: broadcast::Sender<SessionResult<SessionToken>>,
}

#[derive(Default)]
struct SessionSlot {
    token: Option<SessionToken>,
    pending: Option<PendingCreation>,
    generation: u64,
}

enum Role {
    /// This caller performs the creation call
    Leader(u64),
    /// Another caller is already creating; wait for its outcome
    Follower(broadcast::Receiver<SessionResult<SessionToken>>),
}

/// Owns at most one live proxy session and serializes its creation
///
/// # Example
///
/// ```no_run
/// use polite_fetch::fetch::{HttpTransport, SessionCoordinator};
/// use polite_fetch::config::{HttpConfig, UserAgentConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::from_config(&UserAgentConfig::default(), &HttpConfig::default())?;
/// let sessions = SessionCoordinator::new(transport, "http://localhost:8191/v1".parse()?);
/// let token = sessions.acquire().await?;
/// println!("Using session {}", token);
/// # Ok(())
/// # }
/// ```
pub struct SessionCoordinator {
    transport: HttpTransport,
    endpoint: Url,
    slot: Mutex<SessionSlot>,
}

impl SessionCoordinator {
    pub fn new(transport: HttpTransport, endpoint: Url) -> Self {
        Self {
            transport,
            endpoint,
            slot: Mutex::new(SessionSlot::default()),
        }
    }

    /// Returns the cached session, creating one if needed
    ///
    /// Callers arriving while a creation is in flight wait for that creation
    /// and receive its result, success or failure. Failures are not cached:
    /// the next call after a failed creation tries again.
    pub async fn acquire(&self) -> SessionResult<SessionToken> {
        let role = {
            let mut slot = self.lock();
            if let Some(token) = &slot.token {
                return Ok(token.clone());
            }

            let waiting = slot.pending.as_ref().map(|p| p.outcome.subscribe());
            match waiting {
                Some(outcome) => Role::Follower(outcome),
                None => {
                    slot.generation += 1;
                    let generation = slot.generation;
                    let (outcome, _) = broadcast::channel(1);
                    slot.pending = Some(PendingCreation {
                        generation,
                        outcome,
                    });
                    Role::Leader(generation)
                }
            }
        };

        match role {
            Role::Follower(mut outcome) => {
                tracing::debug!("Waiting for in-flight proxy session creation");
                outcome.recv().await.unwrap_or(Err(SessionError::Abandoned))
            }
            Role::Leader(generation) => {
                let guard = CreationGuard {
                    slot: &self.slot,
                    generation,
                    finished: false,
                };
                let outcome = self.create().await;
                guard.finish(outcome)
            }
        }
    }

    /// Drops the cached session so the next [`acquire`](Self::acquire) creates a new one
    pub fn invalidate(&self) {
        if let Some(token) = self.lock().token.take() {
            tracing::debug!("Invalidated proxy session {}", token);
        }
    }

    /// The cached session, without creating one
    pub fn current(&self) -> Option<SessionToken> {
        self.lock().token.clone()
    }

    #[cfg(test)]
    fn is_creating(&self) -> bool {
        self.lock().pending.is_some()
    }

    async fn create(&self) -> SessionResult<SessionToken> {
        tracing::debug!("Creating new proxy session at {}", self.endpoint);

        let response = self
            .transport
            .post_json(self.endpoint.as_str(), &ProxyCommand::CreateSession)
            .await
            .map_err(|source| SessionError::Transport {
                endpoint: self.endpoint.to_string(),
                source: Arc::new(source),
            })?;

        let reply = ProxyReply::parse(&response.body)
            .map_err(|e| SessionError::Malformed(format!("HTTP {}: {}", response.status, e)))?;

        if reply.is_error() {
            return Err(SessionError::Rejected(reply.error_message()));
        }

        let id = reply
            .session
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::MissingSession)?;

        tracing::debug!("Created proxy session {}", id);
        Ok(SessionToken(id))
    }

    fn lock(&self) -> MutexGuard<'_, SessionSlot> {
        lock_slot(&self.slot)
    }
}

fn lock_slot(slot: &Mutex<SessionSlot>) -> MutexGuard<'_, SessionSlot> {
    // Slot updates are single assignments, so a poisoned lock still holds consistent state
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight marker when the leading caller finishes or is dropped
struct CreationGuard<'a> {
    slot: &'a Mutex<SessionSlot>,
    generation: u64,
    finished: bool,
}

impl CreationGuard<'_> {
    fn finish(mut self, outcome: SessionResult<SessionToken>) -> SessionResult<SessionToken> {
        self.finished = true;

        let mut slot = lock_slot(self.slot);
        if let Ok(token) = &outcome {
            slot.token = Some(token.clone());
        }
        if let Some(pending) = take_pending(&mut slot, self.generation) {
            // No receivers just means nobody else was waiting
            let _ = pending.outcome.send(outcome.clone());
        }

        outcome
    }
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        // Dropping the sender wakes followers with a closed channel
        let mut slot = lock_slot(self.slot);
        if take_pending(&mut slot, self.generation).is_some() {
            tracing::warn!("Proxy session creation abandoned before completing");
        }
    }
}

fn take_pending(slot: &mut SessionSlot, generation: u64) -> Option<PendingCreation> {
    let ours = slot
        .pending
        .as_ref()
        .is_some_and(|p| p.generation == generation);
    if ours {
        slot.pending.take()
    } else {
        None
    }
}
