//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → EndPoints → handler chain → prepare → listeners
//!
//! Shutdown (shutdown.rs):
//!     Trigger → every endpoint stops accepting → in-flight requests drain
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then handlers, then listeners
//! - One trigger shared by all endpoints

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_handler, endpoints};
