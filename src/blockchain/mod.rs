//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! ChainConfig list
//!     → registry.rs (one client per chain id)
//!     → client.rs (RPC with timeouts and failover) | memory.rs (simulated chain)
//!
//! Agent send
//!     → wallet.rs (fill fees, gas, nonce; sign or delegate)
//!     → client.rs (broadcast)
//!     → transaction.rs (poll receipt until confirmed)
//! ```
//!
//! # Security Constraints
//! - Private keys arrive only through connect options
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod memory;
pub mod registry;
pub mod signer;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{ChainClient, RpcChainClient};
pub use memory::MemoryChainClient;
pub use registry::ChainRegistry;
pub use signer::{ConnectOptions, InjectedSigner, ProviderKind, PLACEHOLDER_ADDRESS};
pub use types::{ChainError, ChainResult, TxReceipt, TxStatus};
pub use wallet::{PendingTransaction, SendRequest, WalletService};
