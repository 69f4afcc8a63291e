#![warn(missing_docs, missing_debug_implementations)]

//! Check whether Minecraft handles are registered.
//!
//! Each handle is looked up against the Mojang profile API and, when that
//! cannot be reached or refuses service, against a prioritized chain of
//! HTTP relays forwarding the same request. Responses are classified with a
//! deliberate bias: only the API itself is trusted to say a handle is free,
//! while a returned profile is conclusive from any endpoint.
//!
//! # Example
//!
//! ```no_run
//! use nick_avail::Availability;
//! use nick_avail::resolve::Resolver;
//!
//! let resolver = Resolver::new();
//! match resolver.resolve("Notch") {
//!     Ok(Availability::Available) => println!("Handle is available!"),
//!     Ok(Availability::Taken) => println!("Already taken."),
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! ```

use std::fmt;

use serde::Serialize;

pub mod batch;
pub mod classify;
pub mod config;
pub mod endpoint;
pub mod resolve;
pub mod transport;

/// Whether a handle is registered upstream.
///
/// Returned as the success case of
/// [`Resolver::resolve`](resolve::Resolver::resolve); both variants are
/// definitive answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[must_use]
pub enum Availability {
    /// Nobody holds the handle.
    Available,
    /// The handle belongs to an existing profile.
    Taken,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Taken => write!(f, "taken"),
        }
    }
}

/// Comparison key for a handle: handles differ only when their lowercase
/// forms differ.
///
/// ```
/// use nick_avail::handle_key;
/// assert_eq!(handle_key("Notch"), "notch");
/// ```
#[must_use]
pub fn handle_key(handle: &str) -> String {
    handle.to_lowercase()
}

/// Split raw input into handles: one per line, trimmed, blank lines dropped.
///
/// ```
/// use nick_avail::parse_handles;
/// assert_eq!(parse_handles("  Foo \n\n\tbar\n"), ["Foo", "bar"]);
/// ```
#[must_use]
pub fn parse_handles(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
