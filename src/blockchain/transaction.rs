//! Transaction preparation helpers and confirmation monitoring.
//!
//! # Responsibilities
//! - Pad gas estimates with a safety buffer
//! - Poll receipts until the requested confirmation depth is reached
//! - Surface reverts and timeouts as typed errors

use alloy::primitives::TxHash;
use tokio::time::{sleep, timeout};

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{ChainError, ChainResult, TxReceipt};
use crate::resilience::backoff::PollPolicy;

/// Add `percent` on top of an estimated gas limit.
pub fn apply_gas_buffer(estimate: u64, percent: u64) -> u64 {
    estimate.saturating_add(estimate.saturating_mul(percent) / 100)
}

/// Number of confirmations a receipt mined in `tx_block` has at `current_block`.
///
/// The inclusion block itself counts as the first confirmation.
pub fn confirmations_at(tx_block: u64, current_block: u64) -> u64 {
    if current_block < tx_block {
        0
    } else {
        current_block - tx_block + 1
    }
}

/// Wait for a transaction to reach `required` confirmations.
pub async fn wait_for_confirmation(
    client: &dyn ChainClient,
    tx_hash: TxHash,
    required: u64,
    policy: PollPolicy,
) -> ChainResult<TxReceipt> {
    let result = timeout(policy.timeout, async {
        let mut attempt = 0u32;

        loop {
            sleep(policy.delay_before(attempt)).await;
            attempt = attempt.saturating_add(1);

            let receipt = match client.get_transaction_receipt(tx_hash).await? {
                Some(r) => r,
                None => {
                    tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                    continue;
                }
            };

            if !receipt.status {
                return Err(ChainError::Reverted(format!(
                    "transaction {} reverted in block {}",
                    tx_hash, receipt.block_number
                )));
            }

            let current_block = client.get_block_number().await?;
            let confirmations = confirmations_at(receipt.block_number, current_block);

            if confirmations >= required {
                return Ok(receipt);
            }

            tracing::debug!(
                tx_hash = %tx_hash,
                confirmations,
                required,
                "Waiting for confirmations"
            );
        }
    })
    .await;

    match result {
        Ok(outcome) => outcome,
        Err(_) => Err(ChainError::ConfirmationTimeout(policy.timeout.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::MemoryChainClient;
    use std::time::Duration;

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_millis(200),
            base_interval_ms: 5,
            max_interval_ms: 20,
        }
    }

    #[test]
    fn test_gas_buffer() {
        assert_eq!(apply_gas_buffer(21_000, 20), 25_200);
        assert_eq!(apply_gas_buffer(100, 0), 100);
        assert_eq!(apply_gas_buffer(u64::MAX, 20), u64::MAX);
    }

    #[test]
    fn test_confirmation_counting() {
        assert_eq!(confirmations_at(10, 9), 0);
        assert_eq!(confirmations_at(10, 10), 1);
        assert_eq!(confirmations_at(10, 12), 3);
    }

    #[tokio::test]
    async fn test_unknown_transaction_times_out() {
        let chain = MemoryChainClient::new(1);
        let err = wait_for_confirmation(&chain, TxHash::repeat_byte(0xab), 1, fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::ConfirmationTimeout(_)));
    }
}
