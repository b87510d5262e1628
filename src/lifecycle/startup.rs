//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated configuration into the handler chain
//! - Wire the secure-upgrade and transport-policy concerns around the balancer
//!
//! # Design Decisions
//! - Fail fast: any build error is fatal
//! - Nodes register in configuration order, which is also the tie-break order
//! - Endpoints are passed in, the handler never looks them up itself

use std::sync::Arc;

use axum::http::HeaderName;

use crate::config::schema::{NodeConfig, ProxyConfig, RuleConfig};
use crate::error::BuildError;
use crate::handler::Handler;
use crate::load_balancer::{LoadBalancerBuilder, PriorityEvaluator, PriorityRule};
use crate::net::EndPoints;
use crate::proxy::ReverseProxyBuilder;
use crate::resilience::UpstreamTimeouts;
use crate::routing::{AndMatcher, HeaderMatcher, HostMatcher, Matcher, PathPrefixMatcher};
use crate::security::SecureUpgradeBuilder;

/// Endpoints described by the configuration, in declaration order.
pub fn endpoints(config: &ProxyConfig) -> EndPoints {
    config.endpoints.iter().map(|e| e.endpoint()).collect()
}

/// Build the complete handler chain: concerns around a load balancer over the configured nodes.
pub fn build_handler(config: &ProxyConfig, endpoints: &EndPoints) -> Result<Arc<dyn Handler>, BuildError> {
    let timeouts = config.timeouts.upstream_timeouts();

    let mut balancer = LoadBalancerBuilder::new();
    for (index, node) in config.nodes.iter().enumerate() {
        balancer = match &node.when {
            Some(rule) => {
                let rule = priority_rule(&node.label(index), rule)?;
                register(balancer, node, rule, timeouts)?
            }
            None => register(balancer, node, node.priority.unwrap_or_default(), timeouts)?,
        };
    }

    if let Some(strict) = &config.security.strict_transport {
        balancer = balancer.concern(strict.policy());
    }
    balancer = balancer.concern(SecureUpgradeBuilder::new(endpoints.clone()).mode(config.security.upgrade));

    tracing::info!(
        nodes = config.nodes.len(),
        upgrade = config.security.upgrade.as_str(),
        strict_transport = config.security.strict_transport.is_some(),
        "Handler chain built"
    );

    balancer.build()
}

fn register(
    balancer: LoadBalancerBuilder,
    node: &NodeConfig,
    evaluator: impl PriorityEvaluator + 'static,
    timeouts: UpstreamTimeouts,
) -> Result<LoadBalancerBuilder, BuildError> {
    let balancer = match (&node.proxy, &node.redirect) {
        (Some(upstream), None) => {
            let proxy = ReverseProxyBuilder::new().upstream(upstream.as_str()).timeouts(timeouts);
            balancer.proxy_with(proxy, evaluator)
        }
        (None, Some(root)) => balancer.redirect(root.as_str(), evaluator),
        _ => return Err(BuildError::MissingProperty("proxy")),
    };

    Ok(match &node.name {
        Some(name) => balancer.named(name.as_str()),
        None => balancer,
    })
}

fn priority_rule(node: &str, rule: &RuleConfig) -> Result<PriorityRule, BuildError> {
    let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();

    if let Some(host) = &rule.host {
        matchers.push(Box::new(HostMatcher::new(host.as_str())));
    }
    if let Some(prefix) = &rule.path_prefix {
        matchers.push(Box::new(PathPrefixMatcher::new(prefix.as_str())));
    }
    if let Some(header) = &rule.header {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| BuildError::InvalidRule {
            node: node.to_string(),
            reason: e.to_string(),
        })?;
        matchers.push(match &header.value {
            Some(value) => Box::new(HeaderMatcher::equals(name, value.as_str())),
            None => Box::new(HeaderMatcher::present(name)),
        });
    }

    Ok(PriorityRule::new(
        Box::new(AndMatcher::new(matchers)),
        rule.matched,
        rule.otherwise,
    ))
}
