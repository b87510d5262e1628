//! Request handling capability shared by every dispatch component.
//!
//! # Data Flow
//! ```text
//! hosting layer
//!     → concerns (secure upgrade, strict transport, ...)
//!     → load balancer
//!     → selected node (reverse proxy / redirect / nested handler)
//! ```
//!
//! # Design Decisions
//! - Handlers are object safe so nodes can nest arbitrary handlers
//! - `None` means "no content"; the hosting layer answers 204
//! - `prepare` runs once before the first request is served

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::{self, BoxFuture};

use crate::error::ProxyError;

/// Result of handling a single request.
pub type HandlerResult = Result<Option<Response<Body>>, ProxyError>;

/// A component able to answer requests.
pub trait Handler: Send + Sync {
    /// Lifecycle hook invoked once before traffic is served.
    fn prepare(&self) -> BoxFuture<'_, Result<(), ProxyError>> {
        Box::pin(future::ready(Ok(())))
    }

    /// Handle a request.
    fn handle(&self, request: Request<Body>) -> BoxFuture<'_, HandlerResult>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn prepare(&self) -> BoxFuture<'_, Result<(), ProxyError>> {
        (**self).prepare()
    }

    fn handle(&self, request: Request<Body>) -> BoxFuture<'_, HandlerResult> {
        (**self).handle(request)
    }
}

/// Builds a decorator around an already built handler.
pub trait ConcernBuilder: Send {
    fn build(self: Box<Self>, content: Arc<dyn Handler>) -> Arc<dyn Handler>;
}

/// Wrap `content` with the given concerns. The first concern ends up innermost.
pub fn chain(concerns: Vec<Box<dyn ConcernBuilder>>, content: Arc<dyn Handler>) -> Arc<dyn Handler> {
    concerns
        .into_iter()
        .fold(content, |inner, concern| concern.build(inner))
}
