//! Tree Initializer (C5)
//!
//! One-shot bulk population of a fresh store with zero hashes for every
//! node of a depth-D tree. Run once per tree id before the relayer process
//! starts serving traffic (see `bin/tree_init.rs`).

use std::sync::Arc;

use thiserror::Error;

use crate::storage::{MerkleStore, StorageError};

#[derive(Debug, Error)]
pub enum TreeInitError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(
        "tree {tree_id} initialized with wrong row counts: expected {expected_nodes} nodes / \
         {expected_leaves} leaves, got {actual_nodes} / {actual_leaves}"
    )]
    CountMismatch {
        tree_id: u32,
        expected_nodes: u64,
        expected_leaves: u64,
        actual_nodes: u64,
        actual_leaves: u64,
    },
}

pub struct TreeInitializer {
    store: Arc<dyn MerkleStore>,
}

impl TreeInitializer {
    pub fn new(store: Arc<dyn MerkleStore>) -> Self {
        TreeInitializer { store }
    }

    /// Populate `tree_id` as a fresh depth-`depth` tree and verify the
    /// resulting row counts: `2^depth - 1` internal nodes, `2^depth` leaves.
    /// A mismatch is a `Fatal` condition per §7 — this process should not
    /// start serving traffic against a tree it just corrupted.
    pub async fn run(&self, tree_id: u32, depth: u8, chunk_size: usize) -> Result<(), TreeInitError> {
        self.store.init_tree(tree_id, depth, chunk_size).await?;

        let (actual_nodes, actual_leaves) = self.store.counts(tree_id).await?;
        let expected_nodes = (1u64 << depth) - 1;
        let expected_leaves = 1u64 << depth;

        if actual_nodes != expected_nodes || actual_leaves != expected_leaves {
            return Err(TreeInitError::CountMismatch {
                tree_id,
                expected_nodes,
                expected_leaves,
                actual_nodes,
                actual_leaves,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryMerkleStore;

    #[tokio::test]
    async fn run_populates_expected_counts() {
        let store: Arc<dyn MerkleStore> = Arc::new(MemoryMerkleStore::new());
        let init = TreeInitializer::new(store.clone());
        init.run(1, 5, 16).await.unwrap();

        let (nodes, leaves) = store.counts(1).await.unwrap();
        assert_eq!(nodes, 31);
        assert_eq!(leaves, 32);
    }
}
