//! Interpretation of a single endpoint response.
//!
//! [`classify`] is the only place that decides what a status code and body
//! mean. The primary endpoint is authoritative, relays are not: identical
//! responses are trusted from the former and distrusted from the latter,
//! except for a profile carrying an `id` or `name`, which is conclusive from
//! anywhere.

use std::fmt;

use serde_json::Value;

use crate::Availability;

/// Which kind of endpoint produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The identity API queried directly.
    Primary,
    /// A forwarding service wrapping the primary URL.
    Relay,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Relay => write!(f, "relay"),
        }
    }
}

/// Why a response was not trusted and the next endpoint should be tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Retry {
    /// 403 or 429 from the endpoint.
    RateLimited,
    /// A relay answered 204/404, which may be its own failure.
    UntrustedAbsence,
    /// A relay returned JSON without any recognizable field.
    UnrecognizedShape,
    /// Any status outside the known contract.
    UnexpectedStatus,
}

impl fmt::Display for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::UntrustedAbsence => write!(f, "relay absence not trusted"),
            Self::UnrecognizedShape => write!(f, "unrecognized response shape"),
            Self::UnexpectedStatus => write!(f, "unexpected status"),
        }
    }
}

/// The classifier's verdict on one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum Signal {
    /// Trusted answer; stop walking the chain.
    Definitive(Availability),
    /// Too ambiguous to trust, with no failure worth reporting.
    Undecided,
    /// Explicit failure; try the next endpoint.
    Retryable(Retry),
}

/// Classify one response by status first, then by body shape.
///
/// ```
/// use nick_avail::Availability;
/// use nick_avail::classify::{Role, Signal, classify};
///
/// let body = r#"{"id":"069a79f444e94726a5befca90e38aaf5","name":"Notch"}"#;
/// assert_eq!(classify(Role::Relay, 200, body), Signal::Definitive(Availability::Taken));
/// assert_eq!(classify(Role::Primary, 404, ""), Signal::Definitive(Availability::Available));
/// ```
pub fn classify(role: Role, status: u16, body: &str) -> Signal {
    match status {
        403 | 429 => Signal::Retryable(Retry::RateLimited),
        204 | 404 => match role {
            Role::Primary => Signal::Definitive(Availability::Available),
            Role::Relay => Signal::Retryable(Retry::UntrustedAbsence),
        },
        200 => classify_body(role, body),
        _ => Signal::Retryable(Retry::UnexpectedStatus),
    }
}

fn classify_body(role: Role, body: &str) -> Signal {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return match role {
            Role::Primary => Signal::Definitive(Availability::Available),
            Role::Relay => Signal::Undecided,
        };
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        // A 200 from the API that is not JSON is read as "exists" so a
        // broken response never reports a taken handle as free.
        Err(_) => {
            return match role {
                Role::Primary => Signal::Definitive(Availability::Taken),
                Role::Relay => Signal::Undecided,
            };
        }
    };

    if let Value::Object(fields) = &value {
        let has = |key: &str| fields.get(key).is_some_and(truthy);
        if has("id") || has("name") {
            return Signal::Definitive(Availability::Taken);
        }
        if has("error") || has("errorMessage") {
            return Signal::Definitive(Availability::Available);
        }
    }

    match role {
        Role::Primary => Signal::Definitive(Availability::Available),
        Role::Relay => Signal::Retryable(Retry::UnrecognizedShape),
    }
}

/// JSON truthiness as the upstream API's clients understand it.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
