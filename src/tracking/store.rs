//! Transaction records and the per-agent record table.

use alloy::primitives::TxHash;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::blockchain::types::{TxReceipt, TxStatus};
use crate::blockchain::wallet::unix_now;

/// Lifecycle fields shared by deployment and transfer records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRecord {
    pub hash: TxHash,
    pub status: TxStatus,
    /// Submission time, seconds since epoch.
    pub created_at: u64,
    pub receipt: Option<TxReceipt>,
    pub error: Option<String>,
}

impl TxRecord {
    pub fn pending(hash: TxHash) -> Self {
        Self {
            hash,
            status: TxStatus::Pending,
            created_at: unix_now(),
            receipt: None,
            error: None,
        }
    }

    /// Move out of `Pending` exactly once.
    ///
    /// Returns `false` and leaves the record untouched if it is already final.
    pub fn resolve(&mut self, outcome: Result<&TxReceipt, String>) -> bool {
        if self.status.is_final() {
            return false;
        }
        match outcome {
            Ok(receipt) => {
                self.status = TxStatus::Success;
                self.receipt = Some(receipt.clone());
            }
            Err(error) => {
                self.status = TxStatus::Failed;
                self.error = Some(error);
            }
        }
        true
    }
}

/// A record type owning a `TxRecord`.
pub trait Tracked: Clone + Send + Sync + 'static {
    fn tx(&self) -> &TxRecord;
    fn tx_mut(&mut self) -> &mut TxRecord;
}

impl Tracked for TxRecord {
    fn tx(&self) -> &TxRecord {
        self
    }

    fn tx_mut(&mut self) -> &mut TxRecord {
        self
    }
}

struct Slot<R> {
    seq: u64,
    record: R,
}

/// Concurrent record table keyed by transaction hash.
///
/// Holds at most `max_records` entries. When an insert overflows the cap the
/// oldest finished records are evicted; pending records are never evicted.
pub struct RecordStore<R> {
    inner: Arc<DashMap<TxHash, Slot<R>>>,
    next_seq: Arc<AtomicU64>,
    max_records: usize,
}

impl<R> Clone for RecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            next_seq: Arc::clone(&self.next_seq),
            max_records: self.max_records,
        }
    }
}

impl<R: Tracked> RecordStore<R> {
    pub fn new(max_records: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            next_seq: Arc::new(AtomicU64::new(0)),
            max_records: max_records.max(1),
        }
    }

    pub fn insert(&self, record: R) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.inner.insert(record.tx().hash, Slot { seq, record });
        if self.inner.len() > self.max_records {
            self.evict_finished();
        }
    }

    fn evict_finished(&self) {
        let mut finished: Vec<(u64, TxHash)> = self
            .inner
            .iter()
            .filter(|e| e.record.tx().status.is_final())
            .map(|e| (e.seq, *e.key()))
            .collect();
        finished.sort_unstable_by_key(|(seq, _)| *seq);

        let excess = self.inner.len().saturating_sub(self.max_records);
        for (_, hash) in finished.into_iter().take(excess) {
            self.inner.remove(&hash);
        }
        tracing::debug!(evicted = excess, remaining = self.inner.len(), "Evicted finished records");
    }

    pub fn get(&self, hash: &TxHash) -> Option<R> {
        self.inner.get(hash).map(|slot| slot.record.clone())
    }

    /// All records in submission order.
    pub fn all(&self) -> Vec<R> {
        let mut slots: Vec<(u64, R)> = self
            .inner
            .iter()
            .map(|e| (e.seq, e.record.clone()))
            .collect();
        slots.sort_unstable_by_key(|(seq, _)| *seq);
        slots.into_iter().map(|(_, record)| record).collect()
    }

    /// Apply `f` to the stored record; `None` if the hash is unknown.
    pub fn update<T>(&self, hash: &TxHash, f: impl FnOnce(&mut R) -> T) -> Option<T> {
        self.inner.get_mut(hash).map(|mut slot| f(&mut slot.record))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
