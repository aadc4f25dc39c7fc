//! Native and ERC-20 transfers with lifecycle tracking.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

use crate::blockchain::registry::ChainRegistry;
use crate::blockchain::wallet::{SendRequest, WalletService};
use crate::error::{AgentError, AgentResult};
use crate::observability::metrics;
use crate::security::ContractValidator;
use crate::tokens::registry::TokenRegistry;
use crate::tokens::units::{parse_amount, to_token_units, validate_amount};
use crate::tracking::{confirm_and_record, RecordStore, Tracked, TxRecord};

static ADDRESS_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap_or_else(|e| panic!("invalid address pattern: {}", e))
});

/// Caller input for a transfer.
///
/// Unknown keys are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransferParams {
    pub to: String,
    /// Decimal amount in whole units, e.g. `"1.5"`.
    pub amount: String,
    /// ERC-20 contract; `None` sends the native asset.
    #[serde(default, alias = "token_address")]
    pub token_address: Option<String>,
    #[serde(default, alias = "chain_id")]
    pub chain_id: Option<u64>,
}

/// A submitted transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    #[serde(flatten)]
    pub tx: TxRecord,
    pub token_address: Option<Address>,
    pub from: Address,
    pub to: Address,
    pub amount: String,
    /// Amount in the token's smallest unit.
    pub amount_in_wei: U256,
    pub chain_id: u64,
}

impl Tracked for TransferRecord {
    fn tx(&self) -> &TxRecord {
        &self.tx
    }

    fn tx_mut(&mut self) -> &mut TxRecord {
        &mut self.tx
    }
}

/// Validates, submits and tracks transfers.
pub struct TransferAgent {
    chains: Arc<ChainRegistry>,
    tokens: Arc<TokenRegistry>,
    validator: ContractValidator,
    records: RecordStore<TransferRecord>,
}

impl TransferAgent {
    pub fn new(
        chains: Arc<ChainRegistry>,
        tokens: Arc<TokenRegistry>,
        validator: ContractValidator,
        max_records: usize,
    ) -> Self {
        Self {
            chains,
            tokens,
            validator,
            records: RecordStore::new(max_records),
        }
    }

    /// Submit a transfer and return its pending record.
    ///
    /// Confirmation continues in a detached task that resolves the record.
    pub async fn transfer_tokens(
        &self,
        wallet: Arc<WalletService>,
        params: TransferParams,
    ) -> AgentResult<TransferRecord> {
        let from = wallet.address()?;
        let to = parse_recipient(&params.to)?;
        validate_amount(&params.amount)?;

        let wallet_chain = wallet.chain_id()?;
        let chain_id = params.chain_id.unwrap_or(wallet_chain);
        if chain_id != wallet_chain {
            return Err(AgentError::Validation(format!(
                "Wallet is connected to chain {}, not {}",
                wallet_chain, chain_id
            )));
        }

        let token_address = params
            .token_address
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| {
                t.trim()
                    .parse::<Address>()
                    .map_err(|_| AgentError::Validation(format!("Invalid token address: {}", t)))
            })
            .transpose()?;

        let (hash, amount_in_wei) = match token_address {
            Some(token) => self.submit_token(&wallet, chain_id, token, to, &params.amount).await?,
            None => self.submit_native(&wallet, to, &params.amount).await?,
        };

        let record = TransferRecord {
            tx: TxRecord::pending(hash),
            token_address,
            from,
            to,
            amount: params.amount.trim().to_string(),
            amount_in_wei,
            chain_id,
        };
        self.records.insert(record.clone());
        metrics::record_transaction_submitted("transfer");

        tracing::info!(
            tx_hash = %hash,
            from = %from,
            to = %to,
            token = ?token_address,
            amount = %record.amount,
            "Transfer submitted"
        );

        let confirmations = self.chains.confirmations(chain_id);
        let store = self.records.clone();
        tokio::spawn(async move {
            confirm_and_record(wallet, store, hash, confirmations, "transfer", |_, _| {}).await;
        });

        Ok(record)
    }

    async fn submit_token(
        &self,
        wallet: &WalletService,
        chain_id: u64,
        token: Address,
        to: Address,
        amount: &str,
    ) -> AgentResult<(TxHash, U256)> {
        let info = self.tokens.resolve(chain_id, token).await?;
        let units = to_token_units(amount, info.decimals)?;
        let hash = self.tokens.transfer(wallet, token, to, units).await?;
        Ok((hash, units))
    }

    async fn submit_native(
        &self,
        wallet: &WalletService,
        to: Address,
        amount: &str,
    ) -> AgentResult<(TxHash, U256)> {
        let value = parse_amount(amount)?;

        let report = self.validator.validate_transaction(to, value, &Bytes::new());
        if !report.valid {
            return Err(AgentError::Security(report.high_issues()));
        }
        for issue in &report.issues {
            tracing::warn!(severity = %issue.severity, title = %issue.title, "Transfer advisory");
        }

        let hash = wallet
            .send_transaction(SendRequest::call(to, value, Bytes::new()))
            .await?;
        Ok((hash, value))
    }

    pub fn transfer(&self, hash: &TxHash) -> Option<TransferRecord> {
        self.records.get(hash)
    }

    pub fn all_transfers(&self) -> Vec<TransferRecord> {
        self.records.all()
    }
}

fn parse_recipient(to: &str) -> AgentResult<Address> {
    let trimmed = to.trim();
    if !ADDRESS_SHAPE.is_match(trimmed) {
        return Err(AgentError::Validation(format!("Invalid recipient address: {}", to)));
    }
    trimmed
        .parse()
        .map_err(|_| AgentError::Validation(format!("Invalid recipient address: {}", to)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::MemoryChainClient;
    use crate::blockchain::signer::{ConnectOptions, ProviderKind};
    use crate::blockchain::types::TxStatus;
    use crate::config::{ChainConfig, SecurityConfig, TransactionConfig};
    use std::time::Duration;

    struct Fixture {
        agent: TransferAgent,
        wallet: Arc<WalletService>,
        chain: Arc<MemoryChainClient>,
    }

    async fn fixture() -> Fixture {
        let chain = Arc::new(MemoryChainClient::new(1));
        let mut chains = ChainRegistry::new();
        chains.insert(&ChainConfig::simulated(1, "mainnet"), chain.clone());
        let chains = Arc::new(chains);

        let tokens = Arc::new(TokenRegistry::new(chains.clone()));
        let agent = TransferAgent::new(
            chains.clone(),
            tokens,
            ContractValidator::new(&SecurityConfig::default()),
            100,
        );
        let wallet = Arc::new(WalletService::new(
            chains,
            TransactionConfig {
                mock_delay_ms: 5,
                ..Default::default()
            },
        ));
        wallet
            .connect(ProviderKind::Mock, ConnectOptions::default())
            .await
            .unwrap();
        Fixture { agent, wallet, chain }
    }

    fn params(to: &str, amount: &str) -> TransferParams {
        TransferParams {
            to: to.to_string(),
            amount: amount.to_string(),
            ..Default::default()
        }
    }

    async fn wait_final(agent: &TransferAgent, hash: &TxHash) -> TransferRecord {
        for _ in 0..200 {
            let record = agent.transfer(hash).unwrap();
            if record.tx.status.is_final() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("transfer {} never finalized", hash);
    }

    #[tokio::test]
    async fn test_invalid_recipient() {
        let f = fixture().await;
        let err = f
            .agent
            .transfer_tokens(f.wallet.clone(), params("not-an-address", "1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid recipient address"));
        assert!(f.wallet.pending_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_amount() {
        let f = fixture().await;
        let to = format!("{}", Address::repeat_byte(0x12));
        let err = f
            .agent
            .transfer_tokens(f.wallet.clone(), params(&to, "-1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid amount"));
        assert!(f.wallet.pending_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let f = fixture().await;
        f.wallet.disconnect();
        let err = f
            .agent
            .transfer_tokens(f.wallet.clone(), params("not-an-address", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotConnected));
    }

    #[tokio::test]
    async fn test_zero_address_native_transfer_blocked() {
        let f = fixture().await;
        let to = format!("{}", Address::ZERO);
        let err = f
            .agent
            .transfer_tokens(f.wallet.clone(), params(&to, "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Security(_)));
    }

    #[tokio::test]
    async fn test_six_decimal_token_rescaled() {
        let f = fixture().await;
        let token = Address::repeat_byte(0xaa);
        f.chain.register_token(token, "Six", "SIX", 6);

        let mut p = params(&format!("{}", Address::repeat_byte(0x12)), "100");
        p.token_address = Some(format!("{}", token));
        let record = f.agent.transfer_tokens(f.wallet.clone(), p).await.unwrap();

        assert_eq!(record.amount_in_wei, U256::from(100_000_000u64));
        assert_eq!(record.token_address, Some(token));
        assert_eq!(record.tx.status, TxStatus::Pending);
    }

    #[tokio::test]
    async fn test_native_transfer_lifecycle() {
        let f = fixture().await;
        let to = Address::repeat_byte(0x12);
        let record = f
            .agent
            .transfer_tokens(f.wallet.clone(), params(&format!("{}", to), "1.5"))
            .await
            .unwrap();

        assert_eq!(record.tx.status, TxStatus::Pending);
        assert_eq!(record.amount_in_wei, U256::from(1_500_000_000_000_000_000u128));

        let done = wait_final(&f.agent, &record.tx.hash).await;
        assert_eq!(done.tx.status, TxStatus::Success);
        assert!(done.tx.receipt.is_some());
        assert_eq!(f.agent.all_transfers().len(), 1);
    }

    #[tokio::test]
    async fn test_chain_mismatch_rejected() {
        let f = fixture().await;
        let mut p = params(&format!("{}", Address::repeat_byte(0x12)), "1");
        p.chain_id = Some(137);
        let err = f.agent.transfer_tokens(f.wallet.clone(), p).await.unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }
}
