//! Listening endpoints and per-request connection metadata.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;

/// A listening socket of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndPoint {
    pub address: IpAddr,
    pub port: u16,
    /// Whether the endpoint terminates TLS.
    pub secure: bool,
}

impl EndPoint {
    pub fn new(address: IpAddr, port: u16, secure: bool) -> Self {
        Self { address, port, secure }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// URI scheme clients use to reach this endpoint.
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }
}

impl fmt::Display for EndPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme(), self.socket_addr())
    }
}

/// Immutable collection of all endpoints the server listens on.
#[derive(Debug, Clone)]
pub struct EndPoints {
    inner: Arc<[EndPoint]>,
}

impl EndPoints {
    pub fn new(endpoints: impl IntoIterator<Item = EndPoint>) -> Self {
        Self {
            inner: endpoints.into_iter().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndPoint> {
        self.inner.iter()
    }

    /// Endpoints terminating TLS, in configuration order.
    pub fn secure(&self) -> impl Iterator<Item = &EndPoint> {
        self.inner.iter().filter(|e| e.secure)
    }

    pub fn has_secure(&self) -> bool {
        self.secure().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for EndPoints {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl FromIterator<EndPoint> for EndPoints {
    fn from_iter<T: IntoIterator<Item = EndPoint>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Connection metadata attached to every request by the hosting layer.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    /// Endpoint that accepted the connection.
    pub endpoint: EndPoint,
    /// Remote peer address.
    pub client: SocketAddr,
}

impl RequestContext {
    pub fn new(endpoint: EndPoint, client: SocketAddr) -> Self {
        Self { endpoint, client }
    }

    /// Look up the context of a request, if the hosting layer attached one.
    pub fn of(request: &Request<Body>) -> Option<&RequestContext> {
        request.extensions().get::<RequestContext>()
    }
}
