//! Request matching logic.
//!
//! # Responsibilities
//! - Match host header (exact match, case-insensitive, port ignored)
//! - Match path prefix (case-sensitive)
//! - Match a header by presence or exact value
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive and ignores the port
//! - Path matching is case-sensitive
//! - Empty AND = always matches (wildcard)

use axum::body::Body;
use axum::http::{header, HeaderName, Request};

use crate::http::request::host_without_port;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().authority().map(|a| a.as_str()))
            .map(|h| host_without_port(h).eq_ignore_ascii_case(&self.expected_host))
            .unwrap_or(false)
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.uri().path().starts_with(&self.prefix)
    }
}

/// Matches a request header, either by presence or by exact value.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: HeaderName,
    value: Option<String>,
}

impl HeaderMatcher {
    pub fn present(name: HeaderName) -> Self {
        Self { name, value: None }
    }

    pub fn equals(name: HeaderName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: Some(value.into()),
        }
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        let mut values = req.headers().get_all(&self.name).iter();
        match &self.value {
            None => values.next().is_some(),
            Some(expected) => values.any(|v| v.to_str().map(|v| v == expected).unwrap_or(false)),
        }
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}
