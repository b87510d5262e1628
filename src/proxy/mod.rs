//! Reverse proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Request from the load balancer (or directly from the host)
//!     → forwarder.rs (target rewrite, timeouts, streaming)
//!     → headers.rs (hop-by-hop, forwarding, Location rewrite)
//!     → client.rs (pooled upstream connections)
//!     → Response streamed back to the caller
//! ```
//!
//! # Design Decisions
//! - One pooled client per upstream, shared by all requests to it
//! - Bodies are never buffered; hyper applies backpressure both ways
//! - Upstream failures surface as 502/504, never retried here

pub mod builder;
pub mod client;
pub mod forwarder;
pub mod headers;

pub use builder::ReverseProxyBuilder;
pub use forwarder::{upstream_uri, ReverseProxy};
