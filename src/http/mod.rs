//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request context, middleware)
//!     → request.rs (request ID, host extraction)
//!     → handler chain (concerns → load balancer → node)
//!     → response.rs (redirects, empty responses)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
