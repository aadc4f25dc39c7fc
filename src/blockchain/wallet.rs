//! Wallet connection, transaction submission and confirmation.
//!
//! # Security
//! - Private keys live only inside the connected signer
//! - Keys are never logged or serialized
//!
//! A `WalletService` holds at most one connection at a time. Every broadcast
//! is recorded in the pending table, which outlives `disconnect` so detached
//! confirmation tasks can still resolve their entries.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, EthereumWallet, NetworkWallet, TransactionBuilder};
use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;

use crate::blockchain::client::ChainClient;
use crate::blockchain::registry::ChainRegistry;
use crate::blockchain::signer::{
    parse_private_key, ConnectOptions, InjectedSigner, ProviderKind, PLACEHOLDER_ADDRESS,
};
use crate::blockchain::transaction::{apply_gas_buffer, wait_for_confirmation};
use crate::blockchain::types::{TxReceipt, TxStatus};
use crate::config::TransactionConfig;
use crate::error::{AgentError, AgentResult};
use crate::resilience::backoff::PollPolicy;

const SIMULATED_GAS_USED: u64 = 21_000;

/// The signer behind a live connection.
enum WalletProvider {
    Injected(Arc<dyn InjectedSigner>),
    PrivateKey(PrivateKeySigner),
    Mock,
}

impl WalletProvider {
    fn kind(&self) -> ProviderKind {
        match self {
            WalletProvider::Injected(_) => ProviderKind::Injected,
            WalletProvider::PrivateKey(_) => ProviderKind::PrivateKey,
            WalletProvider::Mock => ProviderKind::Mock,
        }
    }
}

struct Connection {
    provider: WalletProvider,
    address: Address,
    chain_id: u64,
}

/// Parameters for `WalletService::send_transaction`.
///
/// Unset fee, gas and nonce fields are filled from the network.
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    /// Destination; `None` deploys `data` as contract creation code.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub nonce: Option<u64>,
}

impl SendRequest {
    pub fn call(to: Address, value: U256, data: Bytes) -> Self {
        Self {
            to: Some(to),
            value,
            data,
            ..Default::default()
        }
    }

    pub fn deploy(code: Bytes) -> Self {
        Self {
            data: code,
            ..Default::default()
        }
    }
}

/// A broadcast transaction as seen by the wallet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub from: Address,
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Option<Address>,
    pub gas_limit: Option<u64>,
    pub simulated: bool,
    pub status: TxStatus,
    pub receipt: Option<TxReceipt>,
    pub error: Option<String>,
    pub submitted_at: u64,
}

struct Prepared {
    request: TransactionRequest,
    nonce: u64,
    gas_limit: u64,
}

/// One wallet connection and its pending-transaction table.
pub struct WalletService {
    chains: Arc<ChainRegistry>,
    config: TransactionConfig,
    connection: ArcSwapOption<Connection>,
    pending: DashMap<TxHash, PendingTransaction>,
    /// Lowest nonce not yet handed out by this wallet.
    next_nonce: AtomicU64,
}

impl WalletService {
    pub fn new(chains: Arc<ChainRegistry>, config: TransactionConfig) -> Self {
        Self {
            chains,
            config,
            connection: ArcSwapOption::empty(),
            pending: DashMap::new(),
            next_nonce: AtomicU64::new(0),
        }
    }

    /// Establish a signer of the requested kind and return its address.
    pub async fn connect(
        &self,
        kind: ProviderKind,
        options: ConnectOptions,
    ) -> AgentResult<Address> {
        let connection = match kind {
            ProviderKind::Injected => self.connect_injected(&options).await?,
            ProviderKind::PrivateKey => self.connect_private_key(&options)?,
            ProviderKind::Mock => {
                let chain_id = options.chain_id.unwrap_or(1);
                if !self.chains.is_supported(chain_id) {
                    return Err(AgentError::Connection(format!(
                        "Unsupported chain {} for mock provider",
                        chain_id
                    )));
                }
                Connection {
                    provider: WalletProvider::Mock,
                    address: options.address.unwrap_or(PLACEHOLDER_ADDRESS),
                    chain_id,
                }
            }
        };

        let address = connection.address;
        tracing::info!(
            address = %address,
            chain_id = connection.chain_id,
            provider = %kind,
            "Wallet connected"
        );

        self.next_nonce.store(0, Ordering::SeqCst);
        self.connection.store(Some(Arc::new(connection)));
        Ok(address)
    }

    async fn connect_injected(&self, options: &ConnectOptions) -> AgentResult<Connection> {
        let signer = options
            .injected
            .clone()
            .ok_or_else(|| AgentError::Connection("No injected signer available".to_string()))?;

        let accounts = signer
            .request_accounts()
            .await
            .map_err(|e| AgentError::Connection(format!("Account request failed: {}", e)))?;
        let address = accounts.first().copied().ok_or_else(|| {
            AgentError::Connection("Injected signer returned no accounts".to_string())
        })?;

        let chain_id = match options.chain_id {
            Some(id) => id,
            None => signer
                .chain_id()
                .await
                .map_err(|e| AgentError::Connection(format!("Chain query failed: {}", e)))?,
        };
        self.require_client(chain_id, ProviderKind::Injected)?;

        Ok(Connection {
            provider: WalletProvider::Injected(signer),
            address,
            chain_id,
        })
    }

    fn connect_private_key(&self, options: &ConnectOptions) -> AgentResult<Connection> {
        let key = options
            .private_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Connection("Private key is required".to_string()))?;
        let signer = parse_private_key(key)?;

        let chain_id = options.chain_id.unwrap_or(1);
        self.require_client(chain_id, ProviderKind::PrivateKey)?;

        Ok(Connection {
            address: signer.address(),
            provider: WalletProvider::PrivateKey(signer),
            chain_id,
        })
    }

    fn require_client(&self, chain_id: u64, kind: ProviderKind) -> AgentResult<()> {
        if self.chains.is_supported(chain_id) {
            Ok(())
        } else {
            Err(AgentError::Connection(format!(
                "Unsupported chain {} for {} provider",
                chain_id, kind
            )))
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.load().is_some()
    }

    /// Connected address, or `NotConnected`.
    pub fn address(&self) -> AgentResult<Address> {
        self.current().map(|c| c.address)
    }

    pub fn chain_id(&self) -> AgentResult<u64> {
        self.current().map(|c| c.chain_id)
    }

    pub fn provider_kind(&self) -> Option<ProviderKind> {
        self.connection.load_full().map(|c| c.provider.kind())
    }

    fn current(&self) -> AgentResult<Arc<Connection>> {
        self.connection.load_full().ok_or(AgentError::NotConnected)
    }

    /// Clear the signer. Pending entries are kept.
    pub fn disconnect(&self) {
        if let Some(previous) = self.connection.swap(None) {
            tracing::info!(address = %previous.address, "Wallet disconnected");
        }
    }

    /// Fill, sign and broadcast a transaction without waiting for it to be mined.
    pub async fn send_transaction(&self, request: SendRequest) -> AgentResult<TxHash> {
        let conn = self.current()?;

        let (hash, nonce, gas_limit, simulated) = match &conn.provider {
            WalletProvider::Mock => {
                let (hash, nonce) = self.simulate_send(&conn, &request).await;
                (hash, nonce, None, true)
            }
            WalletProvider::PrivateKey(signer) => {
                let client = self.chains.client(conn.chain_id)?;
                let prepared = self.prepare(&conn, client.as_ref(), &request).await?;
                let raw = sign_request(signer, prepared.request).await?;
                let hash = client.send_raw_transaction(raw).await?;
                (hash, prepared.nonce, Some(prepared.gas_limit), false)
            }
            WalletProvider::Injected(injected) => {
                let client = self.chains.client(conn.chain_id)?;
                let prepared = self.prepare(&conn, client.as_ref(), &request).await?;
                let hash = injected.send_transaction(prepared.request).await?;
                (hash, prepared.nonce, Some(prepared.gas_limit), false)
            }
        };

        self.pending.insert(
            hash,
            PendingTransaction {
                hash,
                from: conn.address,
                chain_id: conn.chain_id,
                nonce,
                to: request.to,
                gas_limit,
                simulated,
                status: TxStatus::Pending,
                receipt: None,
                error: None,
                submitted_at: unix_now(),
            },
        );
        if self.pending.len() > self.config.max_records.max(1) {
            self.prune_finished();
        }

        tracing::info!(
            tx_hash = %hash,
            from = %conn.address,
            chain_id = conn.chain_id,
            nonce,
            create = request.to.is_none(),
            "Transaction submitted"
        );
        Ok(hash)
    }

    async fn prepare(
        &self,
        conn: &Connection,
        client: &dyn ChainClient,
        request: &SendRequest,
    ) -> AgentResult<Prepared> {
        let mut tx = TransactionRequest::default()
            .with_from(conn.address)
            .with_chain_id(conn.chain_id)
            .with_value(request.value);
        tx = match request.to {
            Some(to) => tx.with_to(to).with_input(request.data.clone()),
            None => tx.with_deploy_code(request.data.clone()),
        };

        let (max_fee, priority_fee) =
            match (request.max_fee_per_gas, request.max_priority_fee_per_gas) {
                (Some(max_fee), Some(priority_fee)) => (max_fee, priority_fee),
                (max_fee, priority_fee) => {
                    let estimate = client.estimate_fees().await?;
                    (
                        max_fee.unwrap_or(estimate.max_fee_per_gas),
                        priority_fee.unwrap_or(estimate.max_priority_fee_per_gas),
                    )
                }
            };
        tx = tx
            .with_max_fee_per_gas(max_fee)
            .with_max_priority_fee_per_gas(priority_fee);

        let gas_limit = match request.gas_limit {
            Some(limit) => limit,
            None => {
                let estimate = client.estimate_gas(&tx).await?;
                apply_gas_buffer(estimate, self.config.gas_limit_buffer_percent)
            }
        };

        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => {
                let chain_nonce = client.get_transaction_count(conn.address).await?;
                self.reserve_nonce(chain_nonce)
            }
        };

        Ok(Prepared {
            request: tx.with_gas_limit(gas_limit).with_nonce(nonce),
            nonce,
            gas_limit,
        })
    }

    /// Hand out the larger of the chain nonce and the local counter.
    ///
    /// Sequential sends from this wallet do not collide while earlier
    /// transactions are still unmined.
    fn reserve_nonce(&self, chain_nonce: u64) -> u64 {
        let previous = self
            .next_nonce
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |local| {
                Some(local.max(chain_nonce) + 1)
            })
            .unwrap_or_else(|v| v);
        previous.max(chain_nonce)
    }

    async fn simulate_send(&self, conn: &Connection, request: &SendRequest) -> (TxHash, u64) {
        sleep(Duration::from_millis(self.config.mock_delay_ms)).await;

        let nonce = self.next_nonce.fetch_add(1, Ordering::SeqCst);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();

        let mut preimage = Vec::with_capacity(64 + request.data.len());
        preimage.extend_from_slice(conn.address.as_slice());
        preimage.extend_from_slice(&conn.chain_id.to_be_bytes());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(&nanos.to_be_bytes());
        preimage.extend_from_slice(&request.data);

        (keccak256(&preimage), nonce)
    }

    /// Wait until `hash` has `confirmations` confirmations and record the outcome.
    pub async fn wait_for_transaction(
        &self,
        hash: TxHash,
        confirmations: u64,
    ) -> AgentResult<TxReceipt> {
        let entry = self
            .pending
            .get(&hash)
            .map(|e| e.value().clone())
            .ok_or_else(|| AgentError::Transaction(format!("Unknown transaction {}", hash)))?;

        let outcome = self.await_receipt(&entry, confirmations.max(1)).await;

        if let Some(mut stored) = self.pending.get_mut(&hash) {
            if stored.status == TxStatus::Pending {
                match &outcome {
                    Ok(receipt) => {
                        stored.status = TxStatus::Success;
                        stored.receipt = Some(receipt.clone());
                    }
                    Err(e) => {
                        stored.status = TxStatus::Failed;
                        stored.error = Some(e.to_string());
                    }
                }
            }
        }

        outcome
    }

    async fn await_receipt(
        &self,
        entry: &PendingTransaction,
        confirmations: u64,
    ) -> AgentResult<TxReceipt> {
        if entry.simulated {
            sleep(Duration::from_millis(self.config.mock_delay_ms)).await;
            return Ok(TxReceipt {
                transaction_hash: entry.hash,
                block_number: entry.nonce + 1,
                gas_used: SIMULATED_GAS_USED,
                status: true,
                contract_address: entry.to.is_none().then(|| entry.from.create(entry.nonce)),
            });
        }

        let client = self.chains.client(entry.chain_id)?;
        let receipt = wait_for_confirmation(
            client.as_ref(),
            entry.hash,
            confirmations,
            PollPolicy::from(&self.config),
        )
        .await?;
        Ok(receipt)
    }

    /// Drop the oldest settled entries once the table exceeds `max_records`.
    /// Entries still pending are kept so their waiters can record the outcome.
    fn prune_finished(&self) {
        let mut settled: Vec<(u64, TxHash)> = self
            .pending
            .iter()
            .filter(|e| e.status.is_final())
            .map(|e| (e.nonce, *e.key()))
            .collect();
        settled.sort_unstable_by_key(|(nonce, _)| *nonce);

        let excess = self.pending.len().saturating_sub(self.config.max_records.max(1));
        for (_, hash) in settled.into_iter().take(excess) {
            self.pending.remove(&hash);
        }
        tracing::debug!(remaining = self.pending.len(), "Pruned settled transactions");
    }

    pub fn pending_transaction(&self, hash: &TxHash) -> Option<PendingTransaction> {
        self.pending.get(hash).map(|e| e.value().clone())
    }

    pub fn pending_transactions(&self) -> Vec<PendingTransaction> {
        self.pending.iter().map(|e| e.value().clone()).collect()
    }
}

impl std::fmt::Debug for WalletService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let conn = self.connection.load_full();
        f.debug_struct("WalletService")
            .field("address", &conn.as_ref().map(|c| c.address))
            .field("chain_id", &conn.as_ref().map(|c| c.chain_id))
            .field("provider", &conn.as_ref().map(|c| c.provider.kind()))
            .field("pending", &self.pending.len())
            .finish()
    }
}

async fn sign_request(signer: &PrivateKeySigner, request: TransactionRequest) -> AgentResult<Bytes> {
    let wallet = EthereumWallet::from(signer.clone());
    let envelope = <EthereumWallet as NetworkWallet<Ethereum>>::sign_request(&wallet, request)
        .await
        .map_err(|e| AgentError::Transaction(format!("Signing failed: {}", e)))?;
    Ok(Bytes::from(envelope.encoded_2718()))
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
