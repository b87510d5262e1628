//! Fluent configuration of a load balancer.

use std::sync::Arc;

use crate::error::BuildError;
use crate::handler::{self, ConcernBuilder, Handler};
use crate::load_balancer::balancer::LoadBalancer;
use crate::load_balancer::node::{Node, NodeHandler};
use crate::load_balancer::priority::{Priority, PriorityEvaluator};
use crate::load_balancer::redirect::RedirectionBuilder;
use crate::proxy::ReverseProxyBuilder;

enum PendingHandler {
    Ready(Arc<dyn Handler>),
    Proxy(ReverseProxyBuilder),
    Redirect(RedirectionBuilder),
}

struct PendingNode {
    name: Option<String>,
    handler: PendingHandler,
    evaluator: Arc<dyn PriorityEvaluator>,
}

/// Collects nodes in registration order; `build` validates and freezes them.
///
/// A bare [`Priority`] is a constant evaluator. The `*_default` methods
/// register a node at `Priority::Medium`.
#[derive(Default)]
pub struct LoadBalancerBuilder {
    nodes: Vec<PendingNode>,
    concerns: Vec<Box<dyn ConcernBuilder>>,
}

impl LoadBalancerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an arbitrary handler.
    pub fn add(self, handler: Arc<dyn Handler>, evaluator: impl PriorityEvaluator + 'static) -> Self {
        self.push(PendingHandler::Ready(handler), evaluator)
    }

    /// Register a reverse proxy to `upstream` with default timeouts.
    pub fn proxy(self, upstream: impl Into<String>, evaluator: impl PriorityEvaluator + 'static) -> Self {
        self.proxy_with(ReverseProxyBuilder::new().upstream(upstream), evaluator)
    }

    /// Register a fully configured reverse proxy.
    pub fn proxy_with(self, proxy: ReverseProxyBuilder, evaluator: impl PriorityEvaluator + 'static) -> Self {
        self.push(PendingHandler::Proxy(proxy), evaluator)
    }

    /// Register a node redirecting to `root`.
    pub fn redirect(self, root: impl Into<String>, evaluator: impl PriorityEvaluator + 'static) -> Self {
        self.push(
            PendingHandler::Redirect(RedirectionBuilder::new().root(root)),
            evaluator,
        )
    }

    /// Register an arbitrary handler at the default priority.
    pub fn add_default(self, handler: Arc<dyn Handler>) -> Self {
        self.add(handler, Priority::default())
    }

    /// Register a reverse proxy to `upstream` at the default priority.
    pub fn proxy_default(self, upstream: impl Into<String>) -> Self {
        self.proxy(upstream, Priority::default())
    }

    /// Register a redirect to `root` at the default priority.
    pub fn redirect_default(self, root: impl Into<String>) -> Self {
        self.redirect(root, Priority::default())
    }

    /// Name the most recently registered node, used in logs and metrics.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.name = Some(name.into());
        }
        self
    }

    pub fn concern(mut self, concern: impl ConcernBuilder + 'static) -> Self {
        self.concerns.push(Box::new(concern));
        self
    }

    fn push(mut self, handler: PendingHandler, evaluator: impl PriorityEvaluator + 'static) -> Self {
        self.nodes.push(PendingNode {
            name: None,
            handler,
            evaluator: Arc::new(evaluator),
        });
        self
    }

    pub fn build(self) -> Result<Arc<dyn Handler>, BuildError> {
        let (balancer, concerns) = self.build_parts()?;
        Ok(handler::chain(concerns, Arc::new(balancer)))
    }

    pub(crate) fn build_parts(self) -> Result<(LoadBalancer, Vec<Box<dyn ConcernBuilder>>), BuildError> {
        if self.nodes.is_empty() {
            return Err(BuildError::NoNodes);
        }

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (index, pending) in self.nodes.into_iter().enumerate() {
            let (default_name, handler) = match pending.handler {
                PendingHandler::Ready(handler) => (format!("node-{}", index), NodeHandler::Nested(handler)),
                PendingHandler::Proxy(builder) => {
                    let (proxy, concerns) = builder.build_parts()?;
                    let name = proxy.upstream().to_string();
                    if concerns.is_empty() {
                        (name, NodeHandler::Proxy(proxy))
                    } else {
                        (name, NodeHandler::Nested(handler::chain(concerns, Arc::new(proxy))))
                    }
                }
                PendingHandler::Redirect(builder) => {
                    let (redirection, concerns) = builder.build_parts()?;
                    let name = redirection.root().to_string();
                    if concerns.is_empty() {
                        (name, NodeHandler::Redirect(redirection))
                    } else {
                        (name, NodeHandler::Nested(handler::chain(concerns, Arc::new(redirection))))
                    }
                }
            };

            let name = pending.name.unwrap_or(default_name);
            tracing::debug!(node = %name, kind = handler.kind(), "Load balancer node registered");
            nodes.push(Node::new(name, handler, pending.evaluator));
        }

        Ok((LoadBalancer::new(nodes), self.concerns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    #[test]
    fn empty_balancer_fails() {
        let err = LoadBalancerBuilder::new().build().err().unwrap();
        assert!(matches!(err, BuildError::NoNodes));
    }

    #[test]
    fn nested_build_errors_propagate() {
        let err = LoadBalancerBuilder::new()
            .proxy("https://secure.example", Priority::default())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::InvalidUpstream { .. }));

        let err = LoadBalancerBuilder::new()
            .proxy_with(ReverseProxyBuilder::new(), Priority::default())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::MissingProperty("upstream")));
    }

    #[test]
    fn nodes_keep_registration_order_and_names() {
        let (balancer, _) = LoadBalancerBuilder::new()
            .proxy("http://127.0.0.1:3000/", Priority::Low)
            .redirect("https://example.com", Priority::High)
            .named("docs")
            .build_parts()
            .unwrap();

        let nodes = balancer.nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name(), "http://127.0.0.1:3000");
        assert_eq!(nodes[0].handler().kind(), "proxy");
        assert_eq!(nodes[1].name(), "docs");
        assert_eq!(nodes[1].handler().kind(), "redirect");
    }

    #[test]
    fn nodes_without_evaluator_rank_medium() {
        let (balancer, _) = LoadBalancerBuilder::new()
            .proxy_default("http://127.0.0.1:3000")
            .redirect_default("https://example.com")
            .add_default(Arc::new(redirect_stub()))
            .build_parts()
            .unwrap();

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        for node in balancer.nodes().iter() {
            assert_eq!(node.evaluate(&request), Priority::Medium);
        }
        assert_eq!(balancer.nodes()[2].handler().kind(), "nested");
    }

    fn redirect_stub() -> crate::load_balancer::Redirection {
        RedirectionBuilder::new()
            .root("https://stub.example")
            .build_parts()
            .unwrap()
            .0
    }
}
