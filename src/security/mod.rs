//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → upgrade.rs (redirect plaintext requests to a secure endpoint)
//!     → inner handler
//!     → transport_policy.rs (Strict-Transport-Security on secure responses)
//! ```
//!
//! # Design Decisions
//! - Both are concerns wrapping the handler they protect
//! - Endpoint collection is injected, never looked up globally
//! - Plaintext-only deployments are served as-is whatever the mode

pub mod transport_policy;
pub mod upgrade;

pub use transport_policy::{StrictTransportConcern, StrictTransportPolicy};
pub use upgrade::{SecureUpgrade, SecureUpgradeBuilder, SecureUpgradeConcern};
