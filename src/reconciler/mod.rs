//! Ledger Event Reconciler (C9)
//!
//! Subscribes to ledger program logs (`LedgerEventSource`, push-shaped so a
//! real websocket/log subscription is a pure adapter swap later) and folds
//! `DepositCompleted` events into the Merkle mirror under the tree's row
//! lock. A polling `tokio::time::interval` stands in for the push
//! subscription here since no concrete ledger program is wired up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::field::FieldElement;
use crate::metrics::Metrics;
use crate::storage::{LedgerDeposit, MerkleStore, StorageError};

/// Raw wire layout of a `DepositCompleted` event: fixed-size byte arrays,
/// endianness per field — `commitment` is LE (legacy convention),
/// `old_merkle_root`/`new_merkle_root` are BE.
#[derive(Debug, Clone)]
pub struct RawDepositCompleted {
    pub deposit_hash: [u8; 32],
    pub owner_cipherpay_pubkey: [u8; 32],
    pub commitment: [u8; 32],
    pub old_merkle_root: [u8; 32],
    pub new_merkle_root: [u8; 32],
    pub next_leaf_index: u64,
    pub mint: String,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("event's next_leaf_index is 0, cannot derive insert_index")]
    InvalidEvent,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Source of ledger events. Push-shaped (`next_event` suspends until one
/// arrives) so a real subscription can replace the polling implementation
/// without touching the reconciler loop itself.
#[async_trait]
pub trait LedgerEventSource: Send + Sync {
    async fn next_event(&self) -> Option<RawDepositCompleted>;
}

/// Test/dev source backed by an in-memory queue, fed by `push`.
pub struct QueueEventSource {
    events: tokio::sync::Mutex<std::collections::VecDeque<RawDepositCompleted>>,
}

impl QueueEventSource {
    pub fn new() -> Self {
        Self { events: tokio::sync::Mutex::new(std::collections::VecDeque::new()) }
    }

    pub async fn push(&self, event: RawDepositCompleted) {
        self.events.lock().await.push_back(event);
    }
}

impl Default for QueueEventSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerEventSource for QueueEventSource {
    async fn next_event(&self) -> Option<RawDepositCompleted> {
        self.events.lock().await.pop_front()
    }
}

/// Converts `raw` to a canonical `LedgerDeposit` and folds it into `store`.
/// The insert index and field-element normalization happen here; the rest
/// (root-divergence check, leaf write, path recompute, root/index update)
/// happens inside `MerkleStore::record_ledger_deposit`, under the tree's
/// row lock.
pub async fn record_ledger_deposit(
    store: &dyn MerkleStore,
    tree_id: u32,
    raw: &RawDepositCompleted,
    metrics: &Metrics,
) -> Result<(), ReconcileError> {
    if raw.next_leaf_index == 0 {
        return Err(ReconcileError::InvalidEvent);
    }
    let insert_index = raw.next_leaf_index - 1;

    let event = LedgerDeposit {
        insert_index,
        commitment: FieldElement::from_le_bytes(&raw.commitment),
        old_root: FieldElement::from_be_bytes(&raw.old_merkle_root),
        new_root: FieldElement::from_be_bytes(&raw.new_merkle_root),
    };

    let outcome = store.record_ledger_deposit(tree_id, &event).await?;

    crate::logging::log_reconcile_event(tree_id, raw.next_leaf_index, outcome.root_divergence, outcome.recompute_divergence);
    if outcome.root_divergence || outcome.recompute_divergence {
        metrics.record_merkle_divergence();
    }

    Ok(())
}

/// Polls `source` forever, applying each event to `store`. Intended to run
/// as a single dedicated `tokio::spawn`ed task — the tree's row lock allows
/// concurrent writers, but a single consumer keeps event ordering intact.
/// A transient storage error is logged and retried on the next poll tick
/// rather than propagated — the event isn't lost, it stays queued at the
/// source.
pub async fn run(
    store: Arc<dyn MerkleStore>,
    tree_id: u32,
    source: Arc<dyn LedgerEventSource>,
    metrics: Arc<Metrics>,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        ticker.tick().await;
        while let Some(event) = source.next_event().await {
            if let Err(e) = record_ledger_deposit(store.as_ref(), tree_id, &event, &metrics).await {
                tracing::error!(target: "relayer::reconcile", error = %e, "failed to apply ledger event, will retry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryMerkleStore;

    fn sample_event(next_leaf_index: u64, commitment: FieldElement, new_root: FieldElement, old_root: FieldElement) -> RawDepositCompleted {
        RawDepositCompleted {
            deposit_hash: [0u8; 32],
            owner_cipherpay_pubkey: [0u8; 32],
            commitment: commitment.to_le_bytes(),
            old_merkle_root: old_root.to_be_bytes(),
            new_merkle_root: new_root.to_be_bytes(),
            next_leaf_index,
            mint: "11111111111111111111111111111111".to_string(),
        }
    }

    #[tokio::test]
    async fn zero_next_index_is_rejected() {
        let store = MemoryMerkleStore::new();
        store.init_tree(1, 3, 100).await.unwrap();
        let metrics = Metrics::new();

        let event = sample_event(0, FieldElement::from_u64(42), FieldElement::ZERO, FieldElement::ZERO);
        let err = record_ledger_deposit(&store, 1, &event, &metrics).await.unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidEvent));
    }

    #[tokio::test]
    async fn matching_event_advances_mirror_without_divergence() {
        let store = MemoryMerkleStore::new();
        store.init_tree(1, 3, 100).await.unwrap();
        let metrics = Metrics::new();

        let old_root = store.get_root(1).await.unwrap();
        let commitment = FieldElement::from_u64(42);

        let left = crate::poseidon::hash2(commitment, FieldElement::ZERO);
        let mid = crate::poseidon::hash2(left, crate::poseidon::zero_cache().get(1));
        let new_root = crate::poseidon::hash2(mid, crate::poseidon::zero_cache().get(2));

        let event = sample_event(1, commitment, new_root, old_root);
        record_ledger_deposit(&store, 1, &event, &metrics).await.unwrap();

        assert_eq!(store.get_root(1).await.unwrap(), new_root);
        assert_eq!(store.get_next_index(1).await.unwrap(), 1);
        assert_eq!(metrics.snapshot().merkle_divergence_total, 0);
    }

    #[tokio::test]
    async fn mismatched_new_root_is_still_adopted_and_counted() {
        let store = MemoryMerkleStore::new();
        store.init_tree(1, 3, 100).await.unwrap();
        let metrics = Metrics::new();

        let old_root = store.get_root(1).await.unwrap();
        let bogus_new_root = FieldElement::from_u64(999_999);

        let event = sample_event(1, FieldElement::from_u64(7), bogus_new_root, old_root);
        record_ledger_deposit(&store, 1, &event, &metrics).await.unwrap();

        assert_eq!(store.get_root(1).await.unwrap(), bogus_new_root);
        assert_eq!(metrics.snapshot().merkle_divergence_total, 1);
    }
}
