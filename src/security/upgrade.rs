//! Secure upgrade of plaintext requests.
//!
//! # Responsibilities
//! - Redirect plaintext requests to a secure endpoint according to the mode
//! - Compute the externally visible secure port
//! - Delegate everything else to the wrapped handler
//!
//! # Design Decisions
//! - Requests on a secure endpoint are never redirected
//! - Without any secure endpoint the concern delegates, even under `Force`
//! - `Force` redirects permanently, `Allow` temporarily and only on request

use std::net::IpAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Method, Request};
use futures_util::future::BoxFuture;
use serde::Deserialize;

use crate::error::ProxyError;
use crate::handler::{ConcernBuilder, Handler, HandlerResult};
use crate::http::request::{host_without_port, request_host};
use crate::http::response::{self, RedirectKind};
use crate::net::{EndPoint, EndPoints, RequestContext};
use crate::observability::metrics;

const UPGRADE_INSECURE_REQUESTS: HeaderName = HeaderName::from_static("upgrade-insecure-requests");

/// Offset between the conventional plaintext and secure ports (80 → 443).
const SECURE_PORT_OFFSET: u16 = 443 - 80;

/// When plaintext requests are upgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecureUpgrade {
    /// Never redirect.
    Off,
    /// Redirect GET requests carrying `Upgrade-Insecure-Requests: 1`.
    #[default]
    Allow,
    /// Redirect every plaintext request.
    Force,
}

impl SecureUpgrade {
    pub fn as_str(self) -> &'static str {
        match self {
            SecureUpgrade::Off => "off",
            SecureUpgrade::Allow => "allow",
            SecureUpgrade::Force => "force",
        }
    }
}

/// Decorator redirecting plaintext requests to a secure endpoint.
pub struct SecureUpgradeConcern {
    mode: SecureUpgrade,
    endpoints: EndPoints,
    content: Arc<dyn Handler>,
}

impl SecureUpgradeConcern {
    pub fn new(content: Arc<dyn Handler>, mode: SecureUpgrade, endpoints: EndPoints) -> Self {
        Self {
            mode,
            endpoints,
            content,
        }
    }

    pub fn mode(&self) -> SecureUpgrade {
        self.mode
    }

    /// Redirect decision for a request, `None` to delegate.
    fn upgrade(&self, request: &Request<Body>) -> Option<RedirectKind> {
        let ctx = match RequestContext::of(request) {
            Some(ctx) => ctx,
            None => {
                tracing::debug!("No request context, secure upgrade skipped");
                return None;
            }
        };

        if ctx.endpoint.secure || !self.endpoints.has_secure() {
            return None;
        }

        match self.mode {
            SecureUpgrade::Force => Some(RedirectKind::Permanent),
            SecureUpgrade::Allow if request.method() == &Method::GET && signals_upgrade(request) => {
                Some(RedirectKind::Temporary)
            }
            _ => None,
        }
    }

    /// Secure location for a plaintext request accepted on `endpoint`.
    pub fn location(&self, request: &Request<Body>, endpoint: &EndPoint) -> Option<String> {
        let port = target_port(endpoint.port, &self.endpoints)?;

        let host = match request_host(request) {
            Some(host) => host_without_port(host).to_string(),
            None => match endpoint.address {
                IpAddr::V4(address) => address.to_string(),
                IpAddr::V6(address) => format!("[{}]", address),
            },
        };

        let port = if port == 443 {
            String::new()
        } else {
            format!(":{}", port)
        };

        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Some(format!("https://{}{}{}", host, port, path_and_query))
    }
}

impl Handler for SecureUpgradeConcern {
    fn prepare(&self) -> BoxFuture<'_, Result<(), ProxyError>> {
        self.content.prepare()
    }

    fn handle(&self, request: Request<Body>) -> BoxFuture<'_, HandlerResult> {
        Box::pin(async move {
            let kind = match self.upgrade(&request) {
                Some(kind) => kind,
                None => return self.content.handle(request).await,
            };

            let location = RequestContext::of(&request).and_then(|ctx| self.location(&request, &ctx.endpoint));
            let location = match location {
                Some(location) => location,
                None => return self.content.handle(request).await,
            };

            tracing::debug!(
                mode = self.mode.as_str(),
                location = %location,
                "Upgrading plaintext request"
            );
            metrics::record_upgrade_redirect(self.mode.as_str());

            let mut response = response::redirect(&location, kind)?;
            if kind == RedirectKind::Temporary {
                response.headers_mut().insert(
                    header::VARY,
                    HeaderValue::from_static("Upgrade-Insecure-Requests"),
                );
            }
            Ok(Some(response))
        })
    }
}

/// Wraps a handler into a [`SecureUpgradeConcern`].
#[derive(Debug, Clone)]
pub struct SecureUpgradeBuilder {
    mode: SecureUpgrade,
    endpoints: EndPoints,
}

impl SecureUpgradeBuilder {
    pub fn new(endpoints: EndPoints) -> Self {
        Self {
            mode: SecureUpgrade::default(),
            endpoints,
        }
    }

    pub fn mode(mut self, mode: SecureUpgrade) -> Self {
        self.mode = mode;
        self
    }
}

impl ConcernBuilder for SecureUpgradeBuilder {
    fn build(self: Box<Self>, content: Arc<dyn Handler>) -> Arc<dyn Handler> {
        if self.mode == SecureUpgrade::Force && !self.endpoints.has_secure() {
            tracing::warn!("Secure upgrade forced but no secure endpoint is configured; requests are served as-is");
        }
        Arc::new(SecureUpgradeConcern::new(content, self.mode, self.endpoints))
    }
}

fn signals_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(UPGRADE_INSECURE_REQUESTS)
        .map(|v| v.as_bytes() == b"1")
        .unwrap_or(false)
}

/// Correlated port if configured, else 443 if listening, else the first secure port.
fn target_port(current: u16, endpoints: &EndPoints) -> Option<u16> {
    let correlated = current.checked_add(SECURE_PORT_OFFSET);
    if let Some(port) = correlated {
        if endpoints.secure().any(|e| e.port == port) {
            return Some(port);
        }
    }

    if endpoints.secure().any(|e| e.port == 443) {
        return Some(443);
    }

    endpoints.secure().next().map(|e| e.port)
}
