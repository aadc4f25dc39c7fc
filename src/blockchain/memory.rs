//! In-memory simulated chain.
//!
//! Accepts signed transactions, mines each into its own block and answers
//! ERC-20 metadata reads for registered tokens. Used for dry runs on chains
//! marked `simulated` and throughout the test suite; it never opens a socket.

use alloy::consensus::{Transaction as _, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{SolInterface, SolValue};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{ChainError, ChainResult, FeeEstimate, TxReceipt};
use crate::tokens::erc20::IERC20::IERC20Calls;

const BASE_GAS: u64 = 21_000;
const CREATE_GAS: u64 = 32_000;
const GAS_PER_BYTE: u64 = 16;

/// A transaction accepted by the simulated chain.
#[derive(Debug, Clone)]
pub struct SimulatedTx {
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
}

#[derive(Debug, Clone)]
struct SimulatedToken {
    name: String,
    symbol: String,
    decimals: u8,
    balances: HashMap<Address, U256>,
}

/// Deterministic in-memory chain client.
#[derive(Debug)]
pub struct MemoryChainClient {
    chain_id: u64,
    block_number: AtomicU64,
    fees: FeeEstimate,
    nonces: DashMap<Address, u64>,
    transactions: DashMap<TxHash, SimulatedTx>,
    receipts: DashMap<TxHash, TxReceipt>,
    code: DashMap<Address, Bytes>,
    tokens: DashMap<Address, SimulatedToken>,
    revert_next: AtomicBool,
}

impl MemoryChainClient {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            block_number: AtomicU64::new(1),
            fees: FeeEstimate {
                max_fee_per_gas: 30_000_000_000,
                max_priority_fee_per_gas: 1_000_000_000,
            },
            nonces: DashMap::new(),
            transactions: DashMap::new(),
            receipts: DashMap::new(),
            code: DashMap::new(),
            tokens: DashMap::new(),
            revert_next: AtomicBool::new(false),
        }
    }

    /// Make `address` answer ERC-20 metadata calls.
    pub fn register_token(&self, address: Address, name: &str, symbol: &str, decimals: u8) {
        self.tokens.insert(
            address,
            SimulatedToken {
                name: name.to_string(),
                symbol: symbol.to_string(),
                decimals,
                balances: HashMap::new(),
            },
        );
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        if let Some(mut entry) = self.tokens.get_mut(&token) {
            entry.balances.insert(owner, amount);
        }
    }

    /// Set the nonce reported for `address`.
    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.nonces.insert(address, nonce);
    }

    /// Mine the next transaction with a failed status.
    pub fn revert_next(&self) {
        self.revert_next.store(true, Ordering::SeqCst);
    }

    /// Look up a transaction accepted by this chain.
    pub fn sent_transaction(&self, hash: &TxHash) -> Option<SimulatedTx> {
        self.transactions.get(hash).map(|r| r.value().clone())
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    fn answer_token_call(&self, token: Address, data: &[u8]) -> ChainResult<Bytes> {
        let entry = self
            .tokens
            .get(&token)
            .ok_or_else(|| ChainError::Rpc(format!("execution reverted: no contract at {}", token)))?;
        let call = IERC20Calls::abi_decode(data)
            .map_err(|e| ChainError::Rpc(format!("execution reverted: {}", e)))?;

        let encoded = match call {
            IERC20Calls::name(_) => (entry.name.clone(),).abi_encode_params(),
            IERC20Calls::symbol(_) => (entry.symbol.clone(),).abi_encode_params(),
            IERC20Calls::decimals(_) => (U256::from(entry.decimals),).abi_encode_params(),
            IERC20Calls::totalSupply(_) => {
                let total = entry
                    .balances
                    .values()
                    .fold(U256::ZERO, |acc, b| acc.saturating_add(*b));
                (total,).abi_encode_params()
            }
            IERC20Calls::balanceOf(c) => {
                let balance = entry.balances.get(&c.account).copied().unwrap_or_default();
                (balance,).abi_encode_params()
            }
            IERC20Calls::allowance(_) => (U256::ZERO,).abi_encode_params(),
            IERC20Calls::transfer(_) | IERC20Calls::approve(_) => (true,).abi_encode_params(),
        };
        Ok(Bytes::from(encoded))
    }
}

#[async_trait]
impl ChainClient for MemoryChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn estimate_fees(&self) -> ChainResult<FeeEstimate> {
        Ok(self.fees)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> ChainResult<u64> {
        let input_len = tx.input.input().map(|b| b.len()).unwrap_or_default() as u64;
        let create = tx.to.map_or(true, |kind| kind.is_create());
        let mut gas = BASE_GAS + input_len * GAS_PER_BYTE;
        if create {
            gas += CREATE_GAS;
        }
        Ok(gas)
    }

    async fn get_transaction_count(&self, address: Address) -> ChainResult<u64> {
        Ok(self.nonces.get(&address).map(|n| *n).unwrap_or_default())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<TxHash> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| ChainError::Rpc(format!("invalid raw transaction: {}", e)))?;
        let hash = keccak256(&raw);

        let to = envelope.kind().to().copied();
        let tx = SimulatedTx {
            nonce: envelope.nonce(),
            gas_limit: envelope.gas_limit(),
            max_fee_per_gas: envelope.max_fee_per_gas(),
            to,
            value: envelope.value(),
            input: envelope.input().clone(),
        };

        let block_number = self.block_number.fetch_add(1, Ordering::SeqCst) + 1;
        let status = !self.revert_next.swap(false, Ordering::SeqCst);
        let contract_address = match (to, status) {
            (None, true) => {
                let address = Address::from_slice(&keccak256(hash)[12..]);
                self.code.insert(address, tx.input.clone());
                Some(address)
            }
            _ => None,
        };

        self.receipts.insert(
            hash,
            TxReceipt {
                transaction_hash: hash,
                block_number,
                gas_used: tx.gas_limit.min(BASE_GAS + tx.input.len() as u64 * GAS_PER_BYTE),
                status,
                contract_address,
            },
        );
        self.transactions.insert(hash, tx);

        tracing::debug!(chain_id = self.chain_id, tx_hash = %hash, block_number, "Simulated transaction mined");
        Ok(hash)
    }

    async fn get_transaction_receipt(&self, hash: TxHash) -> ChainResult<Option<TxReceipt>> {
        Ok(self.receipts.get(&hash).map(|r| r.value().clone()))
    }

    async fn get_block_number(&self) -> ChainResult<u64> {
        // Every poll observes a freshly produced block.
        Ok(self.block_number.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn call(&self, tx: &TransactionRequest) -> ChainResult<Bytes> {
        let to = tx
            .to
            .and_then(|kind| kind.to().copied())
            .ok_or_else(|| ChainError::Rpc("call requires a destination".to_string()))?;
        let data = tx.input.input().cloned().unwrap_or_default();
        self.answer_token_call(to, &data)
    }

    async fn get_code(&self, address: Address) -> ChainResult<Bytes> {
        Ok(self.code.get(&address).map(|c| c.value().clone()).unwrap_or_default())
    }
}
