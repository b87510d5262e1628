//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every node has exactly one target and one way to be ranked
//! - Validate value ranges (timeouts > 0, unique ports)
//! - Check TLS material exists for secure endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no endpoints configured")]
    NoEndpoints,

    #[error("no nodes configured")]
    NoNodes,

    #[error("node {0} has neither `proxy` nor `redirect`")]
    MissingTarget(String),

    #[error("node {0} has both `proxy` and `redirect`")]
    AmbiguousTarget(String),

    #[error("node {0} has both `priority` and `when`")]
    AmbiguousPriority(String),

    #[error("node {0} has a `when` rule without conditions")]
    EmptyRule(String),

    #[error("node {node} matches invalid header name '{name}'")]
    InvalidHeaderName { node: String, name: String },

    #[error("timeout `{0}` must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("port {0} is configured on more than one endpoint")]
    DuplicatePort(u16),

    #[error("endpoint on port {port}: TLS file '{path}' not found")]
    TlsFileMissing { port: u16, path: String },

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoints.is_empty() {
        errors.push(ValidationError::NoEndpoints);
    }

    let mut ports = HashSet::new();
    for endpoint in &config.endpoints {
        if !ports.insert(endpoint.port) {
            errors.push(ValidationError::DuplicatePort(endpoint.port));
        }

        if let Some(tls) = &endpoint.tls {
            for path in [&tls.cert_path, &tls.key_path] {
                if !Path::new(path).is_file() {
                    errors.push(ValidationError::TlsFileMissing {
                        port: endpoint.port,
                        path: path.clone(),
                    });
                }
            }
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.read_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("read_secs"));
    }

    if config.nodes.is_empty() {
        errors.push(ValidationError::NoNodes);
    }

    for (index, node) in config.nodes.iter().enumerate() {
        let label = node.label(index);

        match (&node.proxy, &node.redirect) {
            (None, None) => errors.push(ValidationError::MissingTarget(label.clone())),
            (Some(_), Some(_)) => errors.push(ValidationError::AmbiguousTarget(label.clone())),
            _ => {}
        }

        if node.priority.is_some() && node.when.is_some() {
            errors.push(ValidationError::AmbiguousPriority(label.clone()));
        }

        if let Some(rule) = &node.when {
            if !rule.has_conditions() {
                errors.push(ValidationError::EmptyRule(label.clone()));
            }
            if let Some(header) = &rule.header {
                if HeaderName::from_bytes(header.name.as_bytes()).is_err() {
                    errors.push(ValidationError::InvalidHeaderName {
                        node: label.clone(),
                        name: header.name.clone(),
                    });
                }
            }
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{EndpointConfig, HeaderRule, NodeConfig, RuleConfig, TlsConfig};
    use crate::load_balancer::Priority;

    fn proxy_node(upstream: &str) -> NodeConfig {
        NodeConfig {
            proxy: Some(upstream.to_string()),
            ..NodeConfig::default()
        }
    }

    fn valid() -> ProxyConfig {
        ProxyConfig {
            nodes: vec![proxy_node("http://127.0.0.1:3000")],
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn default_config_lacks_nodes() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoNodes]);
    }

    #[test]
    fn reports_all_errors() {
        let mut config = valid();
        config.endpoints.clear();
        config.timeouts.connect_secs = 0;
        config.timeouts.read_secs = 0;
        config.nodes = vec![
            NodeConfig::default(),
            NodeConfig {
                name: Some("both".to_string()),
                proxy: Some("http://a".to_string()),
                redirect: Some("http://b".to_string()),
                ..NodeConfig::default()
            },
        ];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::NoEndpoints));
        assert!(errors.contains(&ValidationError::ZeroTimeout("connect_secs")));
        assert!(errors.contains(&ValidationError::ZeroTimeout("read_secs")));
        assert!(errors.contains(&ValidationError::MissingTarget("#0".to_string())));
        assert!(errors.contains(&ValidationError::AmbiguousTarget("both".to_string())));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn priority_and_rule_conflict() {
        let mut config = valid();
        config.nodes[0].priority = Some(Priority::High);
        config.nodes[0].when = Some(RuleConfig {
            host: None,
            path_prefix: None,
            header: Some(HeaderRule {
                name: "bad header".to_string(),
                value: None,
            }),
            matched: Priority::Highest,
            otherwise: Priority::Lowest,
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::AmbiguousPriority("#0".to_string())));
        assert!(errors.contains(&ValidationError::InvalidHeaderName {
            node: "#0".to_string(),
            name: "bad header".to_string(),
        }));
    }

    #[test]
    fn duplicate_ports_and_missing_tls() {
        let mut config = valid();
        config.endpoints = vec![
            EndpointConfig::default(),
            EndpointConfig {
                tls: Some(TlsConfig {
                    cert_path: "/nonexistent/cert.pem".to_string(),
                    key_path: "/nonexistent/key.pem".to_string(),
                }),
                ..EndpointConfig::default()
            },
        ];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicatePort(8080)));
        assert!(errors.contains(&ValidationError::TlsFileMissing {
            port: 8080,
            path: "/nonexistent/cert.pem".to_string(),
        }));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn metrics_address_checked_when_enabled() {
        let mut config = valid();
        config.observability.metrics_address = "not-an-address".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidMetricsAddress("not-an-address".to_string())]
        );
    }
}
