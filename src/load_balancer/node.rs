//! Balancer nodes: a handler paired with the evaluator ranking it.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;

use crate::error::ProxyError;
use crate::handler::{Handler, HandlerResult};
use crate::load_balancer::priority::{Priority, PriorityEvaluator};
use crate::load_balancer::redirect::Redirection;
use crate::proxy::ReverseProxy;

/// What a node does with the requests it is selected for.
pub enum NodeHandler {
    Proxy(ReverseProxy),
    Redirect(Redirection),
    Nested(Arc<dyn Handler>),
}

impl NodeHandler {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeHandler::Proxy(_) => "proxy",
            NodeHandler::Redirect(_) => "redirect",
            NodeHandler::Nested(_) => "nested",
        }
    }
}

impl Handler for NodeHandler {
    fn prepare(&self) -> BoxFuture<'_, Result<(), ProxyError>> {
        match self {
            NodeHandler::Proxy(proxy) => proxy.prepare(),
            NodeHandler::Redirect(redirect) => redirect.prepare(),
            NodeHandler::Nested(handler) => handler.prepare(),
        }
    }

    fn handle(&self, request: Request<Body>) -> BoxFuture<'_, HandlerResult> {
        match self {
            NodeHandler::Proxy(proxy) => proxy.handle(request),
            NodeHandler::Redirect(redirect) => redirect.handle(request),
            NodeHandler::Nested(handler) => handler.handle(request),
        }
    }
}

/// A candidate the balancer can route to.
pub struct Node {
    name: String,
    handler: NodeHandler,
    evaluator: Arc<dyn PriorityEvaluator>,
}

impl Node {
    pub fn new(name: impl Into<String>, handler: NodeHandler, evaluator: Arc<dyn PriorityEvaluator>) -> Self {
        Self {
            name: name.into(),
            handler,
            evaluator,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &NodeHandler {
        &self.handler
    }

    pub fn evaluate(&self, request: &Request<Body>) -> Priority {
        self.evaluator.evaluate(request)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.handler.kind())
            .finish()
    }
}
