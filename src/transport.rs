//! HTTP access for the resolver.

use std::io;
use std::time::Duration;

use thiserror::Error;
use ureq::Agent;

/// Per-request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// What came back from one GET, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase for the status, empty if unknown.
    pub reason: String,
    /// Full body decoded as text.
    pub body: String,
}

impl RawResponse {
    /// A response with the canonical reason phrase filled in where known.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let reason = ureq::http::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            reason,
            body: body.into(),
        }
    }
}

/// The request never produced a readable response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The request or body read exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// Socket-level failure (refused, reset, unreachable).
    #[error("connection failed: {0}")]
    Io(#[from] io::Error),
    /// Any other failure reported by the HTTP client (DNS, TLS, protocol).
    #[error("request failed: {0}")]
    Http(#[source] Box<ureq::Error>),
}

impl From<ureq::Error> for TransportError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Timeout(_) => Self::Timeout,
            ureq::Error::Io(e) => Self::Io(e),
            other => Self::Http(Box::new(other)),
        }
    }
}

/// Something that can perform a single uncached, credential-free GET.
///
/// HTTP error statuses are responses, not errors: only failures that leave
/// no status to classify are reported as [`TransportError`].
pub trait Transport {
    /// Fetch `url` and read its whole body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response could be read.
    fn get(&self, url: &str) -> Result<RawResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        (**self).get(url)
    }
}

/// An HTTP client configured for identity API and relay queries.
///
/// Wraps the underlying HTTP agent to insulate callers from the specific
/// HTTP library version used internally. Cookies are never stored or sent.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use nick_avail::transport::Client;
///
/// let client = Client::with_timeout(Duration::from_secs(3));
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    agent: Agent,
}

impl Client {
    /// Create a new client with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a client whose every request is bounded by `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent: Agent::new_with_config(config),
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for Client {
    fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let mut response = self
            .agent
            .get(url)
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .call()?;
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        Ok(RawResponse::new(status, body))
    }
}
