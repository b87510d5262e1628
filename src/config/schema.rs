//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::Deserialize;

use crate::load_balancer::Priority;
use crate::net::EndPoint;
use crate::resilience::UpstreamTimeouts;
use crate::security::{SecureUpgrade, StrictTransportPolicy};

/// Root configuration for the balancing proxy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listening endpoints, plaintext or secure.
    pub endpoints: Vec<EndpointConfig>,

    /// Upstream timeouts shared by every proxy node.
    pub timeouts: TimeoutConfig,

    /// Secure upgrade and transport policy.
    pub security: SecurityConfig,

    /// Balancer nodes in registration (tie-break) order.
    pub nodes: Vec<NodeConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![EndpointConfig::default()],
            timeouts: TimeoutConfig::default(),
            security: SecurityConfig::default(),
            nodes: Vec::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// A listening endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub address: IpAddr,

    pub port: u16,

    /// Certificate and key; the endpoint is secure when present.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            tls: None,
        }
    }
}

impl EndpointConfig {
    pub fn endpoint(&self) -> EndPoint {
        EndPoint::new(self.address, self.port, self.tls.is_some())
    }
}

/// TLS configuration for a secure endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration for upstream exchanges.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the upstream to produce each piece of its response, in seconds.
    pub read_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            read_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn upstream_timeouts(&self) -> UpstreamTimeouts {
        UpstreamTimeouts {
            connect: Duration::from_secs(self.connect_secs),
            read: Duration::from_secs(self.read_secs),
        }
    }
}

/// Security configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// When plaintext requests are redirected to a secure endpoint.
    pub upgrade: SecureUpgrade,

    /// Strict-Transport-Security on secure responses, disabled when absent.
    pub strict_transport: Option<StrictTransportConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrictTransportConfig {
    pub max_age_secs: u64,
    pub include_subdomains: bool,
    pub preload: bool,
}

impl Default for StrictTransportConfig {
    fn default() -> Self {
        let policy = StrictTransportPolicy::default();
        Self {
            max_age_secs: policy.max_age.as_secs(),
            include_subdomains: policy.include_subdomains,
            preload: policy.preload,
        }
    }
}

impl StrictTransportConfig {
    pub fn policy(&self) -> StrictTransportPolicy {
        StrictTransportPolicy {
            max_age: Duration::from_secs(self.max_age_secs),
            include_subdomains: self.include_subdomains,
            preload: self.preload,
        }
    }
}

/// A balancer node. Exactly one of `proxy` / `redirect` must be set,
/// and at most one of `priority` / `when`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identifier for logging/metrics.
    pub name: Option<String>,

    /// Upstream base URL to forward to.
    pub proxy: Option<String>,

    /// Root URL to redirect to.
    pub redirect: Option<String>,

    /// Constant priority (default: medium).
    pub priority: Option<Priority>,

    /// Request-dependent priority.
    pub when: Option<RuleConfig>,
}

impl NodeConfig {
    /// Name used in logs and validation messages.
    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("#{}", index))
    }
}

/// Conditions (AND-combined) selecting between two priorities.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    /// Host header to match (case-insensitive, port ignored).
    #[serde(default)]
    pub host: Option<String>,

    /// Path prefix to match.
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Header to match by presence or exact value.
    #[serde(default)]
    pub header: Option<HeaderRule>,

    #[serde(default = "default_matched")]
    pub matched: Priority,

    #[serde(default = "default_otherwise")]
    pub otherwise: Priority,
}

impl RuleConfig {
    pub fn has_conditions(&self) -> bool {
        self.host.is_some() || self.path_prefix.is_some() || self.header.is_some()
    }
}

fn default_matched() -> Priority {
    Priority::Highest
}

fn default_otherwise() -> Priority {
    Priority::Lowest
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeaderRule {
    pub name: String,

    /// Exact value; presence only when absent.
    #[serde(default)]
    pub value: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
