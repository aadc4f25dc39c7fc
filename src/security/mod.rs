//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Deployment:
//!     → validator.rs (scan source; any high finding aborts before compile)
//!
//! Native transfer:
//!     → validator.rs (check recipient and value; high finding aborts before signing)
//! ```
//!
//! # Design Decisions
//! - Fail closed on high severity only; lower findings are advisory
//! - No trust in caller-provided source

pub mod types;
pub mod validator;

pub use types::{SecurityIssue, Severity, ValidationReport};
pub use validator::ContractValidator;
