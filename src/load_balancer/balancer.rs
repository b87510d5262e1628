//! Priority-based load balancer.
//!
//! # Responsibilities
//! - Evaluate every node against the request
//! - Select the maximal priority, earliest node on ties
//! - Delegate to the selected node, returning its result unchanged
//!
//! # Design Decisions
//! - The node list is immutable and shared without locks
//! - A panicking evaluator fails only the current request (500)
//! - A failing node is terminal for the request; no fallback to the next one

use std::panic::{self, AssertUnwindSafe};

use axum::body::Body;
use axum::http::Request;
use futures_util::future::{self, BoxFuture};

use crate::error::ProxyError;
use crate::handler::{Handler, HandlerResult};
use crate::load_balancer::node::Node;
use crate::load_balancer::priority::{self, Priority};
use crate::observability::metrics;

/// Routes each request to exactly one of its nodes.
#[derive(Debug)]
pub struct LoadBalancer {
    nodes: Box<[Node]>,
}

impl LoadBalancer {
    /// `nodes` must not be empty; the builder guarantees it.
    pub(crate) fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes: nodes.into_boxed_slice(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Index and priority of the node serving this request.
    pub fn select(&self, request: &Request<Body>) -> Result<(usize, Priority), ProxyError> {
        let evaluated = panic::catch_unwind(AssertUnwindSafe(|| {
            self.nodes
                .iter()
                .map(|node| node.evaluate(request))
                .collect::<Vec<_>>()
        }))
        .map_err(|payload| ProxyError::Evaluator(panic_message(payload.as_ref())))?;

        priority::select(evaluated)
            .ok_or_else(|| ProxyError::Internal("load balancer has no nodes".to_string()))
    }
}

impl Handler for LoadBalancer {
    fn prepare(&self) -> BoxFuture<'_, Result<(), ProxyError>> {
        Box::pin(async move {
            future::try_join_all(self.nodes.iter().map(|node| node.handler().prepare())).await?;
            tracing::debug!(nodes = self.nodes.len(), "Load balancer prepared");
            Ok(())
        })
    }

    fn handle(&self, request: Request<Body>) -> BoxFuture<'_, HandlerResult> {
        Box::pin(async move {
            let (index, priority) = match self.select(&request) {
                Ok(selected) => selected,
                Err(e) => {
                    tracing::error!(
                        method = %request.method(),
                        path = %request.uri().path(),
                        error = %e,
                        "Priority evaluation failed"
                    );
                    return Err(e);
                }
            };

            let node = &self.nodes[index];
            tracing::debug!(
                node = %node.name(),
                index,
                priority = %priority,
                "Node selected"
            );
            metrics::record_selection(node.name());

            node.handler().handle(request).await
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "priority evaluator panicked".to_string()
    }
}
