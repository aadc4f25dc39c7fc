//! Transaction lifecycle tracking.
//!
//! # Data Flow
//! ```text
//! Agent submits transaction
//!     → store.rs (insert pending record, return it to the caller)
//!     → tokio::spawn(confirm_and_record)
//!         → WalletService::wait_for_transaction
//!         → store.rs (resolve record once: success | failed)
//! ```
//!
//! # Design Decisions
//! - The spawned task is the only writer of a record after insertion
//! - Confirmation failures are recorded, never re-raised

pub mod store;

use alloy::primitives::TxHash;
use std::sync::Arc;

use crate::blockchain::types::TxReceipt;
use crate::blockchain::wallet::WalletService;
use crate::observability::metrics;

pub use store::{RecordStore, Tracked, TxRecord};

/// Wait for `hash` and resolve its record in `store`.
///
/// `on_success` runs under the record's lock right after it is marked
/// successful. Returns the receipt when the transaction succeeded.
pub async fn confirm_and_record<R: Tracked>(
    wallet: Arc<WalletService>,
    store: RecordStore<R>,
    hash: TxHash,
    confirmations: u64,
    kind: &'static str,
    on_success: impl FnOnce(&mut R, &TxReceipt),
) -> Option<TxReceipt> {
    let outcome = wallet.wait_for_transaction(hash, confirmations).await;

    let resolved = store.update(&hash, |record| {
        let changed = match &outcome {
            Ok(receipt) => record.tx_mut().resolve(Ok(receipt)),
            Err(e) => record.tx_mut().resolve(Err(e.to_string())),
        };
        if changed {
            if let Ok(receipt) = &outcome {
                on_success(record, receipt);
            }
        }
        changed.then(|| record.tx().status)
    });

    match (&outcome, resolved.flatten()) {
        (Ok(receipt), Some(status)) => {
            metrics::record_transaction_finalized(kind, status.as_str());
            tracing::info!(
                kind,
                tx_hash = %hash,
                block_number = receipt.block_number,
                gas_used = receipt.gas_used,
                "Transaction confirmed"
            );
        }
        (Err(e), Some(status)) => {
            metrics::record_transaction_finalized(kind, status.as_str());
            tracing::warn!(kind, tx_hash = %hash, error = %e, "Transaction failed");
        }
        (_, None) => {
            tracing::debug!(kind, tx_hash = %hash, "Record already final or evicted");
        }
    }

    outcome.ok()
}
