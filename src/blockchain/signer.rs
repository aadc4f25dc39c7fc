//! Wallet provider kinds and signer sources.
//!
//! # Security
//! - Private keys are accepted only through `ConnectOptions`
//! - Keys are never logged or serialized

use alloy::primitives::{address, Address, TxHash};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::blockchain::types::{ChainError, ChainResult};

/// Address used by mock wallets when the caller supplies none.
pub const PLACEHOLDER_ADDRESS: Address = address!("0x742d35cc6634c0532925a3b844bc454e4438f44e");

/// How a wallet obtains its signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Host-provided signer (e.g. a browser extension).
    Injected,
    /// Locally held secp256k1 key.
    #[serde(alias = "privateKey")]
    PrivateKey,
    /// Server-side stand-in that never touches the network.
    Mock,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Injected => "injected",
            ProviderKind::PrivateKey => "private_key",
            ProviderKind::Mock => "mock",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signer supplied by the hosting environment.
///
/// The host owns the keys; it signs and broadcasts on request.
#[async_trait]
pub trait InjectedSigner: Send + Sync {
    /// Ask the host for the accounts it is willing to expose.
    async fn request_accounts(&self) -> ChainResult<Vec<Address>>;

    /// Chain the host is currently pointed at.
    async fn chain_id(&self) -> ChainResult<u64>;

    /// Sign and broadcast a fully populated request.
    async fn send_transaction(&self, tx: TransactionRequest) -> ChainResult<TxHash>;
}

/// Parameters for `WalletService::connect`.
#[derive(Clone, Default)]
pub struct ConnectOptions {
    pub chain_id: Option<u64>,
    /// Hex private key, with or without `0x`.
    pub private_key: Option<String>,
    /// Address a mock wallet should report.
    pub address: Option<Address>,
    pub injected: Option<Arc<dyn InjectedSigner>>,
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("chain_id", &self.chain_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("address", &self.address)
            .field("injected", &self.injected.is_some())
            .finish()
    }
}

/// Parse a hex-encoded private key (with or without 0x prefix).
pub fn parse_private_key(private_key_hex: &str) -> ChainResult<PrivateKeySigner> {
    let key_hex = private_key_hex
        .trim()
        .strip_prefix("0x")
        .unwrap_or(private_key_hex.trim());

    key_hex
        .parse()
        .map_err(|e| ChainError::Wallet(format!("Invalid private key format: {}", e)))
}
