//! Redirect responder for redirect-style nodes.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::{self, BoxFuture};
use url::Url;

use crate::error::{BuildError, ProxyError};
use crate::handler::{self, ConcernBuilder, Handler, HandlerResult};
use crate::http::response::{self, RedirectKind};

/// Answers every request with a temporary redirect to `root + path(+query)`.
#[derive(Debug, Clone)]
pub struct Redirection {
    /// Never ends with `/`.
    root: Arc<str>,
}

impl Redirection {
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Location for the given request.
    pub fn location(&self, request: &Request<Body>) -> String {
        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        format!("{}{}", self.root, path_and_query)
    }

    pub fn respond(&self, request: &Request<Body>) -> Result<Response<Body>, ProxyError> {
        let location = self.location(request);
        tracing::debug!(location = %location, "Redirecting request");
        response::redirect(&location, RedirectKind::Temporary)
    }
}

impl Handler for Redirection {
    fn handle(&self, request: Request<Body>) -> BoxFuture<'_, HandlerResult> {
        Box::pin(future::ready(self.respond(&request).map(Some)))
    }
}

/// Builds a [`Redirection`], validating its root.
#[derive(Default)]
pub struct RedirectionBuilder {
    root: Option<String>,
    concerns: Vec<Box<dyn ConcernBuilder>>,
}

impl RedirectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute URL requests are redirected to. One trailing slash is removed.
    pub fn root(mut self, root: impl Into<String>) -> Self {
        let root = root.into();
        self.root = Some(root.strip_suffix('/').unwrap_or(&root).to_string());
        self
    }

    pub fn concern(mut self, concern: impl ConcernBuilder + 'static) -> Self {
        self.concerns.push(Box::new(concern));
        self
    }

    pub fn build(self) -> Result<Arc<dyn Handler>, BuildError> {
        let (redirection, concerns) = self.build_parts()?;
        Ok(handler::chain(concerns, Arc::new(redirection)))
    }

    pub(crate) fn build_parts(self) -> Result<(Redirection, Vec<Box<dyn ConcernBuilder>>), BuildError> {
        let root = self.root.ok_or(BuildError::MissingProperty("root"))?;

        Url::parse(&root).map_err(|e| BuildError::InvalidRoot {
            root: root.clone(),
            reason: e.to_string(),
        })?;

        Ok((
            Redirection {
                root: Arc::from(root),
            },
            self.concerns,
        ))
    }
}
