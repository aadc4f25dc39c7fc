//! Wallet sessions.
//!
//! Each external session id owns at most one connected `WalletService`.
//! Sessions slide forward on every access and are swept once idle past the TTL.

pub mod manager;

pub use manager::{SessionInfo, SessionManager, DEFAULT_SESSION_ID};
