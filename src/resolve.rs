//! Resolution of one handle against the endpoint chain.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::Availability;
use crate::classify::{Retry, Signal, classify};
use crate::endpoint::{Endpoint, EndpointChain};
use crate::transport::{Client, Transport, TransportError};

/// Why a single endpoint did not settle the question.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptFailure {
    /// No response could be read.
    #[error(transparent)]
    Network(#[from] TransportError),
    /// The endpoint refused service with 403 or 429.
    #[error("HTTP {status} {reason}")]
    RateLimited {
        /// 403 or 429.
        status: u16,
        /// Reason phrase.
        reason: String,
    },
    /// The response was too ambiguous to trust.
    #[error("ambiguous response (HTTP {status})")]
    Ambiguous {
        /// Status of the ambiguous response.
        status: u16,
    },
    /// Any other status or shape the endpoint is not trusted for.
    #[error("HTTP {status} {reason} ({retry})")]
    Rejected {
        /// Status as received.
        status: u16,
        /// Reason phrase.
        reason: String,
        /// Why the classifier did not trust the response.
        retry: Retry,
    },
}

impl AttemptFailure {
    /// Whether the failure points at reachability rather than at the answer.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }
}

/// The best explanation available once the chain is exhausted.
#[derive(Debug)]
#[non_exhaustive]
pub enum Diagnostic {
    /// Every endpoint was unreachable or refused service.
    Connectivity(AttemptFailure),
    /// The last endpoint failed for another reason, reported as is.
    Failure(AttemptFailure),
    /// No failure was recorded: the chain was empty or only ambiguous.
    Unverified,
}

/// Errors that can occur while resolving a handle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// Every endpoint was tried without a definitive answer.
    #[error("{}", render(*endpoints, diagnostic))]
    ChainExhausted {
        /// Number of endpoints that were tried.
        endpoints: usize,
        /// What went wrong last.
        diagnostic: Diagnostic,
    },
}

impl ResolveError {
    /// The last recorded endpoint failure, if any.
    #[must_use]
    pub fn last_failure(&self) -> Option<&AttemptFailure> {
        match self {
            Self::ChainExhausted { diagnostic, .. } => match diagnostic {
                Diagnostic::Connectivity(f) | Diagnostic::Failure(f) => Some(f),
                Diagnostic::Unverified => None,
            },
        }
    }
}

fn render(endpoints: usize, diagnostic: &Diagnostic) -> String {
    match diagnostic {
        Diagnostic::Connectivity(last) => format!(
            "all endpoints failed ({endpoints} tried), check your network connectivity (last: {last})"
        ),
        Diagnostic::Failure(last) => last.to_string(),
        Diagnostic::Unverified => "could not verify handle".to_string(),
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity(last) => write!(f, "connectivity: {last}"),
            Self::Failure(last) => write!(f, "{last}"),
            Self::Unverified => write!(f, "unverified"),
        }
    }
}

/// Looks handles up against a fixed endpoint chain.
///
/// Holds no per-lookup state; a single resolver serves a whole batch.
///
/// # Example
///
/// ```no_run
/// use nick_avail::Availability;
/// use nick_avail::resolve::Resolver;
///
/// let resolver = Resolver::new();
/// match resolver.resolve("Notch") {
///     Ok(Availability::Available) => println!("go grab it!"),
///     Ok(status) => println!("{status}"),
///     Err(e) => eprintln!("error: {e}"),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Resolver<T = Client> {
    transport: T,
    chain: EndpointChain,
}

impl Resolver<Client> {
    /// Default client and the default chain.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(Client::new(), EndpointChain::default())
    }
}

impl Default for Resolver<Client> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Resolver<T> {
    /// Resolver over an arbitrary transport and chain.
    pub fn with_transport(transport: T, chain: EndpointChain) -> Self {
        Self { transport, chain }
    }

    /// The chain this resolver walks.
    #[must_use]
    pub fn chain(&self) -> &EndpointChain {
        &self.chain
    }

    /// Determine whether `handle` is registered upstream.
    ///
    /// Endpoints are tried strictly in chain order, each at most once; the
    /// first definitive classification wins.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ChainExhausted`] when no endpoint gave a
    /// definitive answer.
    pub fn resolve(&self, handle: &str) -> Result<Availability, ResolveError> {
        let mut last_failure = None;

        for (position, endpoint) in self.chain.endpoints().iter().enumerate() {
            match self.attempt(endpoint, handle) {
                Ok(availability) => {
                    info!(handle, endpoint = endpoint.name(), %availability, "resolved");
                    return Ok(availability);
                }
                Err(failure) => {
                    debug!(handle, position, endpoint = endpoint.name(), %failure, "endpoint failed");
                    if !matches!(failure, AttemptFailure::Ambiguous { .. }) {
                        last_failure = Some(failure);
                    }
                }
            }
        }

        let endpoints = self.chain.len();
        let diagnostic = match last_failure {
            Some(f) if f.is_connectivity() => Diagnostic::Connectivity(f),
            Some(f) => Diagnostic::Failure(f),
            None => Diagnostic::Unverified,
        };
        warn!(handle, endpoints, %diagnostic, "endpoint chain exhausted");
        Err(ResolveError::ChainExhausted {
            endpoints,
            diagnostic,
        })
    }

    fn attempt(&self, endpoint: &Endpoint, handle: &str) -> Result<Availability, AttemptFailure> {
        let url = self.chain.url_for(endpoint, handle);
        debug!(%endpoint, url = %url, "requesting");
        let response = self.transport.get(&url)?;

        match classify(endpoint.role(), response.status, &response.body) {
            Signal::Definitive(availability) => Ok(availability),
            Signal::Undecided => Err(AttemptFailure::Ambiguous {
                status: response.status,
            }),
            Signal::Retryable(Retry::RateLimited) => Err(AttemptFailure::RateLimited {
                status: response.status,
                reason: response.reason,
            }),
            Signal::Retryable(retry) => Err(AttemptFailure::Rejected {
                status: response.status,
                reason: response.reason,
                retry,
            }),
        }
    }
}
