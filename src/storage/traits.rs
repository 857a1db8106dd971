//! Storage Trait Definitions
//!
//! Defines the abstract interface over the persistent Merkle mirror.
//! Implementations: `SqliteMerkleStore` (production) or `MemoryMerkleStore`
//! (testing).

use async_trait::async_trait;
use thiserror::Error;

use crate::field::FieldElement;

/// Storage errors. Kept narrow and implementation-agnostic; the HTTP layer
/// maps these into the wider `RelayerError` taxonomy.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("tree {0} not found or not initialized")]
    NotFound(u32),

    #[error("commitment not present in tree {0}")]
    CommitmentNotFound(u32),

    #[error("database error: {0}")]
    Database(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("fatal schema error: {0}")]
    Fatal(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A Merkle path from a leaf up to (but not including) the root: one
/// sibling element and one direction bit per layer, `0` = leaf-was-left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath {
    pub elements: Vec<FieldElement>,
    pub bits: Vec<u8>,
}

/// A decoded `DepositCompleted` event, ready to be folded into the mirror.
/// Byte-level parsing and per-field endianness live in the reconciler
/// (`commitment` arrives LE on the wire per legacy convention, `old_root`/
/// `new_root` arrive BE); by the time it reaches the store every field is
/// already a canonical `FieldElement`.
#[derive(Debug, Clone)]
pub struct LedgerDeposit {
    pub insert_index: u64,
    pub commitment: FieldElement,
    pub old_root: FieldElement,
    pub new_root: FieldElement,
}

/// Divergences observed while folding a `LedgerDeposit` into the mirror.
/// Neither field blocks the write — the ledger's values are authoritative —
/// but both are metricized and logged as `ConsistencyWarning`s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// The mirror's root before this deposit didn't match `event.old_root`.
    pub root_divergence: bool,
    /// Recomputing the path from `event.commitment` didn't reproduce `event.new_root`.
    pub recompute_divergence: bool,
}

#[async_trait]
pub trait MerkleStore: Send + Sync {
    /// Depth of `tree_id`. `Fatal` if the tree has never been initialized.
    async fn get_depth(&self, tree_id: u32) -> StorageResult<u8>;

    /// Index of the next free leaf. Defaults to 0 for an uninitialized tree id.
    async fn get_next_index(&self, tree_id: u32) -> StorageResult<u64>;

    /// Current root, with precedence: `merkle_meta.root`, else the most
    /// recent ring slot, else `merkle_meta.zero`, else `zeros(depth)[depth]`.
    async fn get_root(&self, tree_id: u32) -> StorageResult<FieldElement>;

    /// Transactionally write `root` to the next ring slot, upsert
    /// `merkle_meta.root`, and advance the ring pointer. Atomic with
    /// respect to concurrent readers.
    async fn set_root(&self, tree_id: u32, root: FieldElement) -> StorageResult<()>;

    async fn get_leaf(&self, tree_id: u32, index: u64) -> StorageResult<FieldElement>;
    async fn put_leaf(&self, tree_id: u32, index: u64, value: FieldElement) -> StorageResult<()>;

    /// `layer` is always `>= 1`; layer 0 lives in `leaves`.
    async fn get_node(&self, tree_id: u32, layer: u8, index: u64) -> StorageResult<FieldElement>;
    async fn put_node(
        &self,
        tree_id: u32,
        layer: u8,
        index: u64,
        value: FieldElement,
    ) -> StorageResult<()>;

    /// Look up a leaf's index by its value, for inclusion-path lookups by
    /// commitment. `None` if no leaf currently holds that value.
    async fn find_leaf_index(
        &self,
        tree_id: u32,
        commitment: FieldElement,
    ) -> StorageResult<Option<u64>>;

    /// Append `value` at `next_index`, recompute every ancestor up to the
    /// root, advance `next_index`, and write the new root — all inside one
    /// transaction guarded by the tree's row lock. Returns the leaf index
    /// written.
    async fn append_and_recompute(&self, tree_id: u32, value: FieldElement) -> StorageResult<u64>;

    /// Merkle path from leaf `index` to the root, using zero-subtree
    /// fallbacks for absent nodes.
    async fn get_path_by_index(&self, tree_id: u32, index: u64) -> StorageResult<MerklePath>;

    /// Fold a ledger-authoritative deposit event into the mirror under the
    /// tree's row lock. See spec §4.9: writes `leaf(insert_index)`, recomputes
    /// the path, and always adopts `new_root` regardless of divergence.
    async fn record_ledger_deposit(
        &self,
        tree_id: u32,
        event: &LedgerDeposit,
    ) -> StorageResult<ReconcileOutcome>;

    /// One-shot population of a fresh tree: `merkle_meta` plus every
    /// internal node and leaf set to the appropriate zero-subtree constant.
    /// Chunks writes `chunk_size` rows per statement inside one transaction.
    async fn init_tree(&self, tree_id: u32, depth: u8, chunk_size: usize) -> StorageResult<()>;

    /// `(|nodes|, |leaves|)` for a tree, used by the initializer to verify
    /// it wrote exactly `2^depth - 1` nodes and `2^depth` leaves.
    async fn counts(&self, tree_id: u32) -> StorageResult<(u64, u64)>;
}
