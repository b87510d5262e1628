//! Fluent configuration of a reverse proxy.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use url::Url;

use crate::error::BuildError;
use crate::handler::{self, ConcernBuilder, Handler};
use crate::proxy::forwarder::ReverseProxy;
use crate::resilience::UpstreamTimeouts;

const DEFAULT_MAX_IDLE: usize = 32;

/// Collects reverse proxy settings until `build` validates them.
pub struct ReverseProxyBuilder {
    upstream: Option<String>,
    timeouts: UpstreamTimeouts,
    max_idle: usize,
    concerns: Vec<Box<dyn ConcernBuilder>>,
}

impl Default for ReverseProxyBuilder {
    fn default() -> Self {
        Self {
            upstream: None,
            timeouts: UpstreamTimeouts::default(),
            max_idle: DEFAULT_MAX_IDLE,
            concerns: Vec::new(),
        }
    }
}

impl ReverseProxyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base URL of the upstream. One trailing slash is removed.
    pub fn upstream(mut self, upstream: impl Into<String>) -> Self {
        let upstream = upstream.into();
        self.upstream = Some(upstream.strip_suffix('/').unwrap_or(&upstream).to_string());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.read = timeout;
        self
    }

    pub fn timeouts(mut self, timeouts: UpstreamTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Upper bound of idle upstream connections kept for reuse.
    pub fn max_idle_connections(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn concern(mut self, concern: impl ConcernBuilder + 'static) -> Self {
        self.concerns.push(Box::new(concern));
        self
    }

    /// Build the proxy and its concerns.
    pub fn build(self) -> Result<Arc<dyn Handler>, BuildError> {
        let (proxy, concerns) = self.build_parts()?;
        Ok(handler::chain(concerns, Arc::new(proxy)))
    }

    /// Build the bare proxy, handing back the concerns still to be applied.
    pub(crate) fn build_parts(self) -> Result<(ReverseProxy, Vec<Box<dyn ConcernBuilder>>), BuildError> {
        let upstream = self
            .upstream
            .ok_or(BuildError::MissingProperty("upstream"))?;

        let host = parse_upstream(&upstream)?;

        tracing::debug!(
            upstream = %upstream,
            connect_timeout = ?self.timeouts.connect,
            read_timeout = ?self.timeouts.read,
            "Reverse proxy configured"
        );

        let proxy = ReverseProxy::new(Arc::from(upstream), host, self.timeouts, self.max_idle);
        Ok((proxy, self.concerns))
    }
}

/// Validate an upstream base and derive its `Host` header value.
fn parse_upstream(upstream: &str) -> Result<HeaderValue, BuildError> {
    let invalid = |reason: &str| BuildError::InvalidUpstream {
        upstream: upstream.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(upstream).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid("only plaintext http upstreams are supported"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not contain a query or fragment"));
    }
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;

    let host_header = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    HeaderValue::from_str(&host_header).map_err(|e| invalid(&e.to_string()))
}
