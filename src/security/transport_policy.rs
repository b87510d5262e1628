//! Strict-Transport-Security on responses served over secure endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use futures_util::future::BoxFuture;

use crate::error::ProxyError;
use crate::handler::{ConcernBuilder, Handler, HandlerResult};
use crate::net::RequestContext;

/// Contents of the `Strict-Transport-Security` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrictTransportPolicy {
    pub max_age: Duration,
    pub include_subdomains: bool,
    pub preload: bool,
}

impl Default for StrictTransportPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(365 * 24 * 60 * 60),
            include_subdomains: true,
            preload: false,
        }
    }
}

impl StrictTransportPolicy {
    pub fn header_value(&self) -> HeaderValue {
        let mut value = format!("max-age={}", self.max_age.as_secs());
        if self.include_subdomains {
            value.push_str("; includeSubDomains");
        }
        if self.preload {
            value.push_str("; preload");
        }
        // ASCII digits and fixed tokens only
        HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("max-age=0"))
    }
}

/// Adds the policy header to responses for requests accepted on a secure endpoint.
pub struct StrictTransportConcern {
    value: HeaderValue,
    content: Arc<dyn Handler>,
}

impl Handler for StrictTransportConcern {
    fn prepare(&self) -> BoxFuture<'_, Result<(), ProxyError>> {
        self.content.prepare()
    }

    fn handle(&self, request: Request<Body>) -> BoxFuture<'_, HandlerResult> {
        Box::pin(async move {
            let secure = RequestContext::of(&request)
                .map(|ctx| ctx.endpoint.secure)
                .unwrap_or(false);

            let mut response = self.content.handle(request).await?;
            if secure {
                if let Some(response) = response.as_mut() {
                    let headers = response.headers_mut();
                    if !headers.contains_key(header::STRICT_TRANSPORT_SECURITY) {
                        headers.insert(header::STRICT_TRANSPORT_SECURITY, self.value.clone());
                    }
                }
            }
            Ok(response)
        })
    }
}

impl ConcernBuilder for StrictTransportPolicy {
    fn build(self: Box<Self>, content: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(StrictTransportConcern {
            value: self.header_value(),
            content,
        })
    }
}
