//! Blockchain transaction orchestration and wallet sessions.
//!
//! Turns tagged actions ("connect wallet", "deploy token", "send funds") into
//! validated, security-gated, submitted transactions and tracks each one until
//! it is confirmed or fails.

// Core subsystems
pub mod blockchain;
pub mod config;
pub mod error;
pub mod session;

// Agents
pub mod contracts;
pub mod security;
pub mod tokens;
pub mod tracking;

// Entry point
pub mod orchestrator;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::OrchestratorConfig;
pub use error::{AgentError, AgentResult};
pub use lifecycle::Shutdown;
pub use orchestrator::{ActionRequest, ActionResult, ActionType, Orchestrator};
