//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Confirmation wait:
//!     → blockchain::transaction (poll receipt)
//!     → backoff.rs (grow the poll interval between empty polls)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every wait has a deadline
//! - Poll intervals back off so long confirmations do not hammer the node

pub mod backoff;
