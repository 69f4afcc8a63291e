use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use nick_avail::Availability;
use nick_avail::batch::{Batch, RecordState};
use nick_avail::endpoint::{EndpointChain, Relay, UrlShape};
use nick_avail::resolve::{AttemptFailure, ResolveError, Resolver};
use nick_avail::transport::{RawResponse, Transport, TransportError};

/// Routes each request by host to a fixed reply and logs the hosts hit.
#[derive(Default)]
struct Hosts {
    replies: HashMap<&'static str, Reply>,
    hits: RefCell<Vec<String>>,
}

#[derive(Clone)]
enum Reply {
    Status(u16, &'static str),
    Refused,
}

impl Hosts {
    fn reply(mut self, host: &'static str, reply: Reply) -> Self {
        self.replies.insert(host, reply);
        self
    }

    fn hits(&self) -> Vec<String> {
        self.hits.borrow().clone()
    }
}

impl Transport for Hosts {
    fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let host = url
            .trim_start_matches("http://")
            .split(['/', '?'])
            .next()
            .unwrap_or_default()
            .to_string();
        self.hits.borrow_mut().push(host.clone());
        match self.replies.get(host.as_str()) {
            Some(Reply::Status(status, body)) => Ok(RawResponse::new(*status, *body)),
            Some(Reply::Refused) | None => Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
        }
    }
}

/// Primary at `api`, relays at `a`, `b`, `c`, `d`.
fn chain() -> EndpointChain {
    let relay = |name: &str| {
        Relay::new(name, UrlShape::Query {
            base: format!("http://{name}/raw"),
            param: "url".into(),
        })
    };
    EndpointChain::new("http://api/profiles", vec![
        relay("a"),
        relay("b"),
        relay("c"),
        relay("d"),
    ])
}

fn resolve(hosts: &Hosts, handle: &str) -> Result<Availability, ResolveError> {
    Resolver::with_transport(hosts, chain()).resolve(handle)
}

#[test]
fn primary_profile_is_taken_without_relays() {
    let hosts = Hosts::default().reply("api", Reply::Status(200, r#"{"id":"abc","name":"Foo"}"#));
    assert_eq!(resolve(&hosts, "Foo").unwrap(), Availability::Taken);
    assert_eq!(hosts.hits(), ["api"]);
}

#[test]
fn primary_not_found_is_available_without_relays() {
    let hosts = Hosts::default().reply("api", Reply::Status(404, ""));
    assert_eq!(resolve(&hosts, "Foo").unwrap(), Availability::Available);
    assert_eq!(hosts.hits(), ["api"]);
}

#[test]
fn primary_no_content_is_available() {
    let hosts = Hosts::default().reply("api", Reply::Status(204, ""));
    assert_eq!(resolve(&hosts, "Foo").unwrap(), Availability::Available);
}

#[test]
fn forbidden_primary_falls_back_once() {
    let hosts = Hosts::default()
        .reply("api", Reply::Status(403, ""))
        .reply("a", Reply::Status(200, r#"{"errorMessage":"Couldn't find any profile"}"#));
    assert_eq!(resolve(&hosts, "Foo").unwrap(), Availability::Available);
    assert_eq!(hosts.hits(), ["api", "a"]);
}

#[test]
fn relay_no_content_is_not_trusted() {
    let hosts = Hosts::default()
        .reply("api", Reply::Status(403, ""))
        .reply("a", Reply::Status(204, ""))
        .reply("b", Reply::Status(200, r#"{"id":"x"}"#));
    assert_eq!(resolve(&hosts, "Foo").unwrap(), Availability::Taken);
    assert_eq!(hosts.hits(), ["api", "a", "b"]);
}

#[test]
fn every_endpoint_rate_limited_recommends_connectivity_check() {
    let hosts = Hosts::default()
        .reply("api", Reply::Status(403, ""))
        .reply("a", Reply::Status(429, ""))
        .reply("b", Reply::Status(403, ""))
        .reply("c", Reply::Status(429, ""))
        .reply("d", Reply::Status(429, ""));
    let err = resolve(&hosts, "Foo").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("all endpoints failed"), "{message}");
    assert!(message.contains("connectivity"), "{message}");
    assert_eq!(hosts.hits().len(), 5);
    assert!(matches!(
        err,
        ResolveError::ChainExhausted { endpoints: 5, .. }
    ));
}

#[test]
fn network_failure_then_relay_profile_is_taken() {
    let hosts = Hosts::default()
        .reply("api", Reply::Refused)
        .reply("a", Reply::Status(502, "Bad Gateway"))
        .reply("b", Reply::Status(200, r#"{"id":"x"}"#));
    assert_eq!(resolve(&hosts, "Foo").unwrap(), Availability::Taken);
    assert_eq!(hosts.hits(), ["api", "a", "b"]);
}

#[test]
fn all_refused_is_connectivity() {
    let hosts = Hosts::default();
    let err = resolve(&hosts, "Foo").unwrap_err();
    assert!(err.to_string().contains("check your network connectivity"));
    assert!(matches!(err.last_failure(), Some(AttemptFailure::Network(_))));
    assert_eq!(hosts.hits().len(), 5);
}

#[test]
fn last_non_connectivity_failure_is_verbatim() {
    let hosts = Hosts::default()
        .reply("api", Reply::Refused)
        .reply("a", Reply::Refused)
        .reply("b", Reply::Refused)
        .reply("c", Reply::Refused)
        .reply("d", Reply::Status(200, "{}"));
    let err = resolve(&hosts, "Foo").unwrap_err();
    assert_eq!(err.to_string(), "HTTP 200 OK (unrecognized response shape)");
}

#[test]
fn relay_html_is_skipped() {
    let hosts = Hosts::default()
        .reply("api", Reply::Status(429, ""))
        .reply("a", Reply::Status(200, "<!doctype html><p>rate limited</p>"))
        .reply("b", Reply::Status(200, "null"))
        .reply("c", Reply::Status(200, r#"{"name":"Foo"}"#));
    assert_eq!(resolve(&hosts, "Foo").unwrap(), Availability::Taken);
    assert_eq!(hosts.hits(), ["api", "a", "b", "c"]);
}

#[test]
fn never_more_requests_than_endpoints() {
    for reply in [
        Reply::Refused,
        Reply::Status(403, ""),
        Reply::Status(500, ""),
        Reply::Status(200, "garbage"),
    ] {
        let hosts = Hosts::default()
            .reply("a", reply.clone())
            .reply("b", reply.clone())
            .reply("c", reply.clone())
            .reply("d", reply);
        let _ = resolve(&hosts, "Foo");
        assert_eq!(hosts.hits().len(), 5);
    }
}

#[test]
fn batch_collapses_case_variants() {
    let hosts = Hosts::default().reply("api", Reply::Status(404, ""));
    let resolver = Resolver::with_transport(&hosts, chain());
    let mut batch = Batch::new();
    batch.begin(["Foo", "foo", "BAR"]);
    batch.run(&resolver, &AtomicBool::new(false), Duration::ZERO, |_| {});

    let tally = batch.tally();
    assert_eq!(tally.total, 2);
    assert_eq!(tally.available, 2);
    assert_eq!(hosts.hits().len(), 2);
    assert_eq!(batch.get("FOO").unwrap().handle, "foo");
    assert_eq!(batch.get("bar").unwrap().state, RecordState::Available);
}

#[test]
fn batch_records_resolution_errors() {
    let hosts = Hosts::default();
    let resolver = Resolver::with_transport(&hosts, chain());
    let mut batch = Batch::new();
    batch.begin(["Foo"]);
    batch.run(&resolver, &AtomicBool::new(false), Duration::ZERO, |_| {});
    match &batch.get("foo").unwrap().state {
        RecordState::Error { message } => assert!(message.contains("connectivity"), "{message}"),
        other => panic!("expected Error, got {other:?}"),
    }
    assert_eq!(batch.tally().errors, 1);
}

#[test]
#[ignore] // requires network access
fn public_api_taken_returns_taken() {
    match Resolver::new().resolve("Notch") {
        Ok(Availability::Taken) => {}
        other => panic!("expected Taken, got {other:?}"),
    }
}
