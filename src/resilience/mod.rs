//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → connect bounded by the connect timeout
//!     → response head bounded by the read timeout
//!     → timeouts.rs (every body frame bounded by the read timeout)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No automatic retries: a failed forward is terminal for the request
//! - Timeout errors are distinct from other upstream errors

pub mod timeouts;

pub use timeouts::{TimeoutBody, UpstreamTimeouts};
