//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured endpoints
//!     → endpoint.rs (address, port, secure flag)
//!     → tls.rs (certificate loading for secure endpoints)
//!     → Hand off to HTTP layer (one listener per endpoint)
//! ```
//!
//! # Design Decisions
//! - The endpoint collection is immutable once the server is built
//! - Consumers receive the collection explicitly, never via globals
//! - TLS is terminated by the hosting layer; the dispatch core only sees the flag

pub mod endpoint;
pub mod tls;

pub use endpoint::{EndPoint, EndPoints, RequestContext};
