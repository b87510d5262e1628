//! Request matching subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path, headers)
//!     → matcher.rs (evaluate match conditions)
//!     → load_balancer::priority (matched / otherwise priority)
//! ```
//!
//! # Design Decisions
//! - Matchers compiled at startup, immutable at runtime
//! - No regex in hot path (exact and prefix matching only)
//! - Deterministic: same input always gives the same answer

pub mod matcher;

pub use matcher::{AndMatcher, HeaderMatcher, HostMatcher, Matcher, PathPrefixMatcher};
