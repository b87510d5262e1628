//! Priority-based load balancer and streaming reverse proxy.
//!
//! Requests pass through optional concerns (secure upgrade, transport
//! policy) into a load balancer that ranks its nodes per request and
//! delegates to the winner: a reverse proxy, a redirect, or any other
//! [`Handler`].

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod net;
pub mod routing;

pub mod load_balancer;
pub mod proxy;

pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::{BuildError, ProxyError};
pub use handler::{ConcernBuilder, Handler, HandlerResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{LoadBalancerBuilder, Priority, RedirectionBuilder};
pub use net::{EndPoint, EndPoints, RequestContext};
pub use proxy::ReverseProxyBuilder;
pub use security::{SecureUpgrade, SecureUpgradeBuilder, StrictTransportPolicy};
