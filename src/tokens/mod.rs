//! Token subsystem.
//!
//! # Data Flow
//! ```text
//! Transfer request
//!     → transfer.rs (validate recipient and amount)
//!     → registry.rs (cached metadata, or on-chain lookup)
//!     → units.rs (rescale to token decimals)
//!     → erc20.rs (encode call) → WalletService
//! ```

pub mod erc20;
pub mod registry;
pub mod transfer;
pub mod units;

pub use registry::{TokenInfo, TokenRegistry};
pub use transfer::{TransferAgent, TransferParams, TransferRecord};
