//! Action orchestration.
//!
//! # Data Flow
//! ```text
//! ActionRequest { actionType, sessionId, payload }
//!     → actions.rs (parse tag)
//!     → dispatcher.rs (route within an `action` span)
//!         → session / contracts / tokens
//!     → ActionResult { success, actionType, data?, error? }
//! ```

pub mod actions;
pub mod dispatcher;

pub use actions::{ActionRequest, ActionResult, ActionType};
pub use dispatcher::Orchestrator;
