//! Reverse proxy forwarding.
//!
//! # Responsibilities
//! - Rewrite the request target onto the upstream base
//! - Forward headers minus hop-by-hop ones, stream the body unmodified
//! - Enforce connect and read timeouts
//! - Stream the upstream response back without buffering it
//!
//! # Data Flow
//! ```text
//! Request
//!     → upstream_uri (base + path + query)
//!     → headers.rs (strip hop-by-hop, add Forwarded / X-Forwarded-*)
//!     → client.rs (pooled connection, connect timeout)
//!     → stream request body, then await response head (read timeout)
//!     → headers.rs (strip hop-by-hop, rewrite Location)
//!     → TimeoutBody(upstream body) → client
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Response, Uri, Version};
use futures_util::future::BoxFuture;
use tokio::time::timeout;

use crate::error::ProxyError;
use crate::handler::{Handler, HandlerResult};
use crate::net::RequestContext;
use crate::observability::metrics;
use crate::proxy::headers;
use crate::proxy::client::{self, UploadBody, UpstreamClient};
use crate::resilience::{TimeoutBody, UpstreamTimeouts};

/// Forwards requests to a single upstream.
pub struct ReverseProxy {
    /// Base URL, never ending with `/`.
    upstream: Arc<str>,
    /// Value of the `Host` header sent upstream.
    host: HeaderValue,
    timeouts: UpstreamTimeouts,
    client: UpstreamClient,
}

impl ReverseProxy {
    pub(crate) fn new(upstream: Arc<str>, host: HeaderValue, timeouts: UpstreamTimeouts, max_idle: usize) -> Self {
        Self {
            upstream,
            host,
            timeouts,
            client: client::upstream_client(timeouts.connect, max_idle),
        }
    }

    /// The normalized upstream base URL.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn timeouts(&self) -> UpstreamTimeouts {
        self.timeouts
    }

    /// Forward one request to the upstream and stream its response back.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let start = Instant::now();
        let method = request.method().clone();

        let result = self.exchange(request).await;
        match &result {
            Ok(response) => {
                metrics::record_request(method.as_str(), response.status().as_u16(), &self.upstream, start);
            }
            Err(e) => {
                tracing::warn!(
                    upstream = %self.upstream,
                    method = %method,
                    error = %e,
                    "Upstream request failed"
                );
                metrics::record_upstream_error(&self.upstream, e.error_code());
            }
        }
        result
    }

    async fn exchange(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let (mut parts, body) = request.into_parts();

        let target = upstream_uri(&self.upstream, &parts.uri)?;
        let ctx = parts.extensions.get::<RequestContext>().copied();
        let original_host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()));

        tracing::debug!(
            method = %parts.method,
            target = %target,
            "Forwarding request upstream"
        );

        headers::strip_hop_by_hop(&mut parts.headers);
        headers::append_forwarding(&mut parts.headers, ctx.as_ref(), original_host.as_deref());
        parts.headers.insert(header::HOST, self.host.clone());
        parts.uri = target;
        parts.version = Version::HTTP_11;

        let (body, sent) = UploadBody::new(body);
        let response = self.client.request(Request::from_parts(parts, Body::new(body)));
        tokio::pin!(response);

        // The read deadline starts once the request body is out.
        let outcome = tokio::select! {
            biased;
            outcome = &mut response => outcome,
            _ = sent => match timeout(self.timeouts.read, &mut response).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(ProxyError::ReadTimeout {
                        upstream: self.upstream.to_string(),
                        timeout: self.timeouts.read,
                    })
                }
            },
        };
        let response = outcome.map_err(|e| client::classify(&self.upstream, e, self.timeouts.connect))?;

        let (mut parts, incoming) = response.into_parts();
        headers::strip_hop_by_hop(&mut parts.headers);
        if let Some(host) = original_host {
            let scheme = ctx.map(|c| c.endpoint.scheme()).unwrap_or("http");
            headers::rewrite_location(&mut parts.headers, &self.upstream, &format!("{}://{}", scheme, host));
        }

        let body = TimeoutBody::new(incoming, self.timeouts.read, self.upstream.clone());
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

impl Handler for ReverseProxy {
    fn handle(&self, request: Request<Body>) -> BoxFuture<'_, HandlerResult> {
        Box::pin(async move { self.forward(request).await.map(Some) })
    }
}

/// Absolute upstream URI for a request: base followed by the original path and query.
pub fn upstream_uri(upstream: &str, original: &Uri) -> Result<Uri, ProxyError> {
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let target = if path_and_query.starts_with('/') {
        format!("{}{}", upstream, path_and_query)
    } else {
        format!("{}/{}", upstream, path_and_query)
    };

    target
        .parse()
        .map_err(|e| ProxyError::InvalidTarget(format!("'{}': {}", target, e)))
}
