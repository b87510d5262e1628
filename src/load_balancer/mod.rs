//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → balancer.rs (evaluate every node)
//!     → priority.rs (maximum priority, first registered on ties)
//!     → node.rs (proxy / redirect / nested handler)
//!     → Response returned unchanged
//! ```
//!
//! # Design Decisions
//! - Node list fixed at build time, shared read-only across requests
//! - Node handlers are a closed enum resolved once by the builder
//! - Builders are separate from the immutable balancer they produce

pub mod balancer;
pub mod builder;
pub mod node;
pub mod priority;
pub mod redirect;

pub use balancer::LoadBalancer;
pub use builder::LoadBalancerBuilder;
pub use node::{Node, NodeHandler};
pub use priority::{Priority, PriorityEvaluator, PriorityRule};
pub use redirect::{Redirection, RedirectionBuilder};
