//! Chain client boundary and its JSON-RPC implementation.
//!
//! # Responsibilities
//! - Define the read/write surface the orchestrator needs from a node
//! - Connect to JSON-RPC endpoints with failover
//! - Handle timeouts and network errors gracefully

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::TransportResult;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{ChainError, ChainResult, FeeEstimate, TxReceipt};
use crate::config::ChainConfig;

/// Read/write access to one EVM network.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain this client is bound to.
    fn chain_id(&self) -> u64;

    /// Current EIP-1559 fee suggestion.
    async fn estimate_fees(&self) -> ChainResult<FeeEstimate>;

    /// Gas required to execute `tx`.
    async fn estimate_gas(&self, tx: &TransactionRequest) -> ChainResult<u64>;

    /// Next nonce for `address`.
    async fn get_transaction_count(&self, address: Address) -> ChainResult<u64>;

    /// Broadcast a signed, EIP-2718 encoded transaction.
    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<TxHash>;

    async fn get_transaction_receipt(&self, hash: TxHash) -> ChainResult<Option<TxReceipt>>;

    async fn get_block_number(&self) -> ChainResult<u64>;

    /// Execute a read-only call.
    async fn call(&self, tx: &TransactionRequest) -> ChainResult<Bytes>;

    /// Deployed bytecode at `address`.
    async fn get_code(&self, address: Address) -> ChainResult<Bytes>;
}

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Blockchain RPC client wrapper with failover support.
#[derive(Clone)]
pub struct RpcChainClient {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    /// Configuration.
    config: ChainConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl RpcChainClient {
    /// Create a new RPC chain client.
    ///
    /// The chain ID is verified against the node but a mismatch or an
    /// unreachable node only logs a warning.
    pub async fn new(config: ChainConfig) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url)) as DynProvider);

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider);
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    "Chain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    chain_id = config.chain_id,
                    error = %e,
                    "Chain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let actual = self
            .with_failover("get_chain_id", |p| async move { p.get_chain_id().await })
            .await?;
        if actual != self.config.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.config.chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// Run `op` against each provider in turn until one answers in time.
    async fn with_failover<T, F, Fut>(&self, op: &'static str, f: F) -> ChainResult<T>
    where
        F: Fn(DynProvider) -> Fut + Send + Sync,
        Fut: Future<Output = TransportResult<T>> + Send,
        T: Send,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, f(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, op, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, op, "RPC timeout, trying next provider");
                }
            }
        }
        Err(ChainError::Rpc(format!("All RPC providers failed: {}", op)))
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

fn convert_receipt(receipt: TransactionReceipt) -> TxReceipt {
    TxReceipt {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number.unwrap_or_default(),
        gas_used: receipt.gas_used,
        status: receipt.status(),
        contract_address: receipt.contract_address,
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    async fn estimate_fees(&self) -> ChainResult<FeeEstimate> {
        let estimate = self
            .with_failover("estimate_eip1559_fees", |p| async move {
                p.estimate_eip1559_fees().await
            })
            .await?;

        let current_gwei = (estimate.max_fee_per_gas / 1_000_000_000) as u64;
        if current_gwei > self.config.max_gas_price_gwei {
            return Err(ChainError::GasPriceTooHigh {
                current_gwei,
                max_gwei: self.config.max_gas_price_gwei,
            });
        }

        Ok(FeeEstimate {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> ChainResult<u64> {
        self.with_failover("estimate_gas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(tx).await }
        })
        .await
    }

    async fn get_transaction_count(&self, address: Address) -> ChainResult<u64> {
        self.with_failover("get_transaction_count", |p| async move {
            p.get_transaction_count(address).await
        })
        .await
        .map_err(|e| ChainError::Nonce(e.to_string()))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<TxHash> {
        self.with_failover("send_raw_transaction", |p| {
            let raw = raw.clone();
            async move {
                let pending = p.send_raw_transaction(&raw).await?;
                Ok(*pending.tx_hash())
            }
        })
        .await
    }

    async fn get_transaction_receipt(&self, hash: TxHash) -> ChainResult<Option<TxReceipt>> {
        let receipt = self
            .with_failover("get_transaction_receipt", |p| async move {
                p.get_transaction_receipt(hash).await
            })
            .await?;
        Ok(receipt.map(convert_receipt))
    }

    async fn get_block_number(&self) -> ChainResult<u64> {
        self.with_failover("get_block_number", |p| async move { p.get_block_number().await })
            .await
    }

    async fn call(&self, tx: &TransactionRequest) -> ChainResult<Bytes> {
        self.with_failover("call", |p| {
            let tx = tx.clone();
            async move { p.call(tx).await }
        })
        .await
    }

    async fn get_code(&self, address: Address) -> ChainResult<Bytes> {
        self.with_failover("get_code", |p| async move { p.get_code_at(address).await })
            .await
    }
}

impl std::fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
