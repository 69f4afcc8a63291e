//! The ordered chain of endpoints a handle is looked up against.

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::classify::Role;

/// Default identity API: answers 200 with `{id, name}` for registered handles.
pub const DEFAULT_PRIMARY_BASE: &str = "https://api.mojang.com/users/profiles/minecraft";

/// Bytes left alone by JavaScript's `encodeURIComponent`; relays expect that form.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a string for use as a single path segment or query value.
///
/// ```
/// use nick_avail::endpoint::encode_component;
/// assert_eq!(encode_component("a b/c?"), "a%20b%2Fc%3F");
/// assert_eq!(encode_component("Foo_bar-1"), "Foo_bar-1");
/// ```
#[must_use]
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// How a relay expects the target URL to be passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum UrlShape {
    /// `{base}?{param}={encoded target}`
    Query {
        /// Relay URL up to the query string.
        base: String,
        /// Query parameter carrying the target.
        param: String,
    },
    /// `{base}?{encoded target}`
    BareQuery {
        /// Relay URL up to the query string.
        base: String,
    },
    /// `{base}{target}`, target left unencoded.
    Prefix {
        /// Prepended verbatim to the target URL.
        base: String,
    },
}

impl UrlShape {
    fn wrap(&self, target: &str) -> String {
        match self {
            Self::Query { base, param } => {
                format!("{base}?{param}={}", encode_component(target))
            }
            Self::BareQuery { base } => format!("{base}?{}", encode_component(target)),
            Self::Prefix { base } => format!("{base}{target}"),
        }
    }
}

/// A named forwarding service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relay {
    /// Identifier used in logs and diagnostics.
    pub name: String,
    /// URL builder for this relay.
    #[serde(flatten)]
    pub shape: UrlShape,
}

impl Relay {
    /// Create a relay descriptor.
    pub fn new(name: impl Into<String>, shape: UrlShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// The relays the tool falls back on when nothing else is configured,
    /// in priority order.
    #[must_use]
    pub fn defaults() -> Vec<Relay> {
        vec![
            Relay::new(
                "allorigins",
                UrlShape::Query {
                    base: "https://api.allorigins.win/raw".into(),
                    param: "url".into(),
                },
            ),
            Relay::new(
                "corsproxy",
                UrlShape::BareQuery {
                    base: "https://corsproxy.io/".into(),
                },
            ),
            Relay::new(
                "cors-anywhere",
                UrlShape::Prefix {
                    base: "https://cors-anywhere.herokuapp.com/".into(),
                },
            ),
            Relay::new(
                "codetabs",
                UrlShape::Query {
                    base: "https://api.codetabs.com/v1/proxy".into(),
                    param: "quest".into(),
                },
            ),
        ]
    }
}

/// One position in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// The identity API itself.
    Primary,
    /// A relay forwarding to the identity API.
    Relay(Relay),
}

impl Endpoint {
    /// Trust level the classifier applies to this endpoint's responses.
    #[must_use]
    pub fn role(&self) -> Role {
        match self {
            Self::Primary => Role::Primary,
            Self::Relay(_) => Role::Relay,
        }
    }

    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Primary => "primary",
            Self::Relay(relay) => &relay.name,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Relay(relay) => write!(f, "relay {}", relay.name),
        }
    }
}

/// A fixed, ordered list of endpoints sharing one primary base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointChain {
    primary_base: String,
    endpoints: Vec<Endpoint>,
}

impl EndpointChain {
    /// Primary endpoint first, followed by `relays` in the given order.
    pub fn new(primary_base: impl Into<String>, relays: Vec<Relay>) -> Self {
        let endpoints = std::iter::once(Endpoint::Primary)
            .chain(relays.into_iter().map(Endpoint::Relay))
            .collect();
        Self {
            primary_base: primary_base.into().trim_end_matches('/').to_string(),
            endpoints,
        }
    }

    /// A chain with no endpoints at all. Every lookup against it fails.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            primary_base: String::new(),
            endpoints: Vec::new(),
        }
    }

    /// The endpoints in the order they are tried.
    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Number of endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the chain has no endpoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// The direct lookup URL for `handle`.
    #[must_use]
    pub fn primary_url(&self, handle: &str) -> String {
        format!("{}/{}", self.primary_base, encode_component(handle))
    }

    /// The URL to request from `endpoint` when looking up `handle`.
    #[must_use]
    pub fn url_for(&self, endpoint: &Endpoint, handle: &str) -> String {
        let target = self.primary_url(handle);
        match endpoint {
            Endpoint::Primary => target,
            Endpoint::Relay(relay) => relay.shape.wrap(&target),
        }
    }
}

impl Default for EndpointChain {
    fn default() -> Self {
        Self::new(DEFAULT_PRIMARY_BASE, Relay::defaults())
    }
}
