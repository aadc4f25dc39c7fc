//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Logging/metrics → Chain registry → Agents → Orchestrator → Background tasks
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Session sweeper exits → Join with deadline
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - In-flight confirmation tasks are not joined; they end with the runtime

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{assemble, build_orchestrator, start, Runtime, StartupError};
