//! Per-chain token metadata cache with on-chain fallback.

use alloy::network::TransactionBuilder;
use alloy::primitives::{address, Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::blockchain::client::ChainClient;
use crate::blockchain::registry::ChainRegistry;
use crate::blockchain::wallet::{SendRequest, WalletService};
use crate::error::{AgentError, AgentResult};
use crate::observability::metrics;
use crate::tokens::erc20::IERC20;

/// Cached metadata for one token on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub address: Address,
    pub chain_id: u64,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Curated entry rather than an on-chain lookup.
    pub is_verified: bool,
}

fn well_known_tokens() -> Vec<TokenInfo> {
    let seed = |address, name: &str, symbol: &str, decimals| TokenInfo {
        address,
        chain_id: 1,
        name: name.to_string(),
        symbol: symbol.to_string(),
        decimals,
        is_verified: true,
    };
    vec![
        seed(
            address!("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            "USD Coin",
            "USDC",
            6,
        ),
        seed(
            address!("0xdac17f958d2ee523a2206206994597c13d831ec7"),
            "Tether USD",
            "USDT",
            6,
        ),
        seed(
            address!("0x6b175474e89094c44da98b954eedeac495271d0f"),
            "Dai Stablecoin",
            "DAI",
            18,
        ),
    ]
}

/// Token cache keyed by `(chain_id, address)`.
///
/// Process-wide and read-mostly; share it through `Arc`.
pub struct TokenRegistry {
    chains: Arc<ChainRegistry>,
    tokens: DashMap<(u64, Address), TokenInfo>,
}

impl TokenRegistry {
    /// Registry seeded with well-known mainnet tokens.
    pub fn new(chains: Arc<ChainRegistry>) -> Self {
        let registry = Self::empty(chains);
        for info in well_known_tokens() {
            registry.register_token(info);
        }
        registry
    }

    pub fn empty(chains: Arc<ChainRegistry>) -> Self {
        Self {
            chains,
            tokens: DashMap::new(),
        }
    }

    pub fn get_token(&self, chain_id: u64, address: Address) -> Option<TokenInfo> {
        self.tokens.get(&(chain_id, address)).map(|e| e.value().clone())
    }

    /// Insert or overwrite the entry for `(info.chain_id, info.address)`.
    pub fn register_token(&self, info: TokenInfo) {
        tracing::debug!(
            chain_id = info.chain_id,
            token = %info.address,
            symbol = %info.symbol,
            "Token registered"
        );
        self.tokens.insert((info.chain_id, info.address), info);
        metrics::record_token_cache_size(self.tokens.len());
    }

    pub fn tokens_for_chain(&self, chain_id: u64) -> Vec<TokenInfo> {
        let mut tokens: Vec<TokenInfo> = self
            .tokens
            .iter()
            .filter(|e| e.key().0 == chain_id)
            .map(|e| e.value().clone())
            .collect();
        tokens.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        tokens
    }

    /// Read name, symbol and decimals from the chain and cache them.
    pub async fn load_token_info(&self, chain_id: u64, address: Address) -> AgentResult<TokenInfo> {
        let client = self.chains.client(chain_id)?;

        let (name, symbol, decimals) = tokio::try_join!(
            read::<IERC20::nameCall>(client.as_ref(), address, IERC20::nameCall {}),
            read::<IERC20::symbolCall>(client.as_ref(), address, IERC20::symbolCall {}),
            read::<IERC20::decimalsCall>(client.as_ref(), address, IERC20::decimalsCall {}),
        )?;

        let info = TokenInfo {
            address,
            chain_id,
            name,
            symbol,
            decimals,
            is_verified: false,
        };
        tracing::info!(chain_id, token = %address, symbol = %info.symbol, decimals, "Token loaded from chain");
        self.register_token(info.clone());
        Ok(info)
    }

    /// Cached entry, or an on-chain lookup on a miss.
    pub async fn resolve(&self, chain_id: u64, address: Address) -> AgentResult<TokenInfo> {
        match self.get_token(chain_id, address) {
            Some(info) => Ok(info),
            None => self.load_token_info(chain_id, address).await,
        }
    }

    /// Submit `transfer(to, amount)` from the wallet's account.
    pub async fn transfer(
        &self,
        wallet: &WalletService,
        token: Address,
        to: Address,
        amount: U256,
    ) -> AgentResult<TxHash> {
        let data = IERC20::transferCall { to, amount }.abi_encode();
        wallet
            .send_transaction(SendRequest::call(token, U256::ZERO, Bytes::from(data)))
            .await
    }

    /// Submit `approve(spender, amount)` from the wallet's account.
    pub async fn approve(
        &self,
        wallet: &WalletService,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> AgentResult<TxHash> {
        let data = IERC20::approveCall { spender, amount }.abi_encode();
        wallet
            .send_transaction(SendRequest::call(token, U256::ZERO, Bytes::from(data)))
            .await
    }

    pub async fn allowance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> AgentResult<U256> {
        let client = self.chains.client(chain_id)?;
        read::<IERC20::allowanceCall>(client.as_ref(), token, IERC20::allowanceCall { owner, spender })
            .await
    }

    pub async fn balance_of(&self, chain_id: u64, token: Address, account: Address) -> AgentResult<U256> {
        let client = self.chains.client(chain_id)?;
        read::<IERC20::balanceOfCall>(client.as_ref(), token, IERC20::balanceOfCall { account }).await
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// `eth_call` a single-output view function and decode its return value.
async fn read<C: SolCall>(client: &dyn ChainClient, token: Address, call: C) -> AgentResult<C::Return> {
    let request = TransactionRequest::default()
        .with_to(token)
        .with_input(call.abi_encode());
    let raw = client.call(&request).await?;
    C::abi_decode_returns(&raw).map_err(|e| {
        AgentError::Transaction(format!(
            "Invalid {} response from {}: {}",
            C::SIGNATURE,
            token,
            e
        ))
    })
}
