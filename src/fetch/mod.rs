//! Fetch module for page retrieval
//!
//! This module contains the core fetching logic, including:
//! - The HTTP transport shared by every request
//! - The FlareSolverr-compatible proxy wire format
//! - Proxy session coordination with single-flight creation
//! - The dispatcher choosing between the proxy and direct routes

mod dispatcher;
mod protocol;
mod session;
mod transport;

pub use dispatcher::Dispatcher;
pub use protocol::{ProxyCommand, ProxyReply, ReplyStatus, Solution};
pub use session::{SessionCoordinator, SessionToken};
pub use transport::{build_http_client, HttpTransport, TransportResponse};
