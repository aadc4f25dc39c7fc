//! Contract deployment subsystem.
//!
//! # Data Flow
//! ```text
//! Deploy request
//!     → templates.rs (instantiate template, or take raw source)
//!     → security::validator (high finding aborts here)
//!     → compiler.rs (compile, pick target, encode constructor)
//!     → deployment.rs (submit via WalletService, track record)
//!     → verifier.rs (optional, after confirmation)
//! ```

pub mod compiler;
pub mod deployment;
pub mod templates;
pub mod verifier;

pub use compiler::{Compiler, CompilerOutput, CompilerSettings, SolcCompiler};
pub use deployment::{DeployParams, DeploymentAgent, DeploymentRecord};
pub use templates::{BuiltinTemplates, ContractTemplate, TemplateStore};
pub use verifier::{CodePresenceVerifier, ContractVerifier, VerificationOutcome};
