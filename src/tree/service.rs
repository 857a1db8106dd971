//! Canonical Tree Service (C4)
//!
//! A thin, typed facade over the persistent `MerkleStore`. Every operation
//! here is safe to call from an HTTP handler directly: it does no byte
//! parsing (the caller already holds `FieldElement`s) and surfaces a small,
//! HTTP-friendly error enum instead of raw storage errors.

use std::sync::Arc;

use thiserror::Error;

use crate::field::FieldElement;
use crate::storage::{MerklePath, MerkleStore, StorageError};

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("commitment not present in tree {tree_id}")]
    CommitmentNotFound { tree_id: u32 },

    #[error("leaf index {index} out of range for tree {tree_id}")]
    IndexNotFound { tree_id: u32, index: u64 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// `(root, next_leaf_index)`, the pair returned to most witness callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootAndIndex {
    pub root: FieldElement,
    pub next_index: u64,
}

pub struct TreeService {
    tree_id: u32,
    store: Arc<dyn MerkleStore>,
}

impl TreeService {
    pub fn new(tree_id: u32, store: Arc<dyn MerkleStore>) -> Self {
        TreeService { tree_id, store }
    }

    pub fn tree_id(&self) -> u32 {
        self.tree_id
    }

    pub async fn depth(&self) -> Result<u8, TreeError> {
        Ok(self.store.get_depth(self.tree_id).await?)
    }

    pub async fn get_root(&self) -> Result<FieldElement, TreeError> {
        Ok(self.store.get_root(self.tree_id).await?)
    }

    pub async fn get_root_and_index(&self) -> Result<RootAndIndex, TreeError> {
        let root = self.store.get_root(self.tree_id).await?;
        let next_index = self.store.get_next_index(self.tree_id).await?;
        Ok(RootAndIndex { root, next_index })
    }

    /// Append a new leaf at `next_index`. Commitment uniqueness is not
    /// enforced here or anywhere in the store — callers are responsible for
    /// choosing commitments that don't collide; a colliding commitment would
    /// simply mean two leaves with the same value, which the tree happily
    /// stores and indexes both of (inclusion lookups resolve to whichever
    /// write happened last).
    pub async fn append(&self, value: FieldElement) -> Result<u64, TreeError> {
        Ok(self.store.append_and_recompute(self.tree_id, value).await?)
    }

    pub async fn get_path_by_index(&self, index: u64) -> Result<MerklePath, TreeError> {
        Ok(self.store.get_path_by_index(self.tree_id, index).await?)
    }

    /// Locate the leaf holding `commitment` via the store's `fe_hex` index,
    /// then resolve its path the same way `get_path_by_index` would.
    pub async fn get_path_by_commitment(
        &self,
        commitment: FieldElement,
    ) -> Result<(u64, MerklePath), TreeError> {
        let index = self
            .store
            .find_leaf_index(self.tree_id, commitment)
            .await?
            .ok_or(TreeError::CommitmentNotFound { tree_id: self.tree_id })?;
        let path = self.store.get_path_by_index(self.tree_id, index).await?;
        Ok((index, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryMerkleStore;

    async fn service(depth: u8) -> TreeService {
        let store: Arc<dyn MerkleStore> = Arc::new(MemoryMerkleStore::new());
        store.init_tree(1, depth, 2000).await.unwrap();
        TreeService::new(1, store)
    }

    #[tokio::test]
    async fn append_then_find_by_commitment() {
        let svc = service(4).await;
        let leaf = FieldElement::from_u64(99);
        let idx = svc.append(leaf).await.unwrap();

        let (found_idx, path) = svc.get_path_by_commitment(leaf).await.unwrap();
        assert_eq!(found_idx, idx);
        assert_eq!(path.elements.len(), 4);
    }

    #[tokio::test]
    async fn missing_commitment_is_not_found() {
        let svc = service(4).await;
        let err = svc
            .get_path_by_commitment(FieldElement::from_u64(404))
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::CommitmentNotFound { .. }));
    }

    #[tokio::test]
    async fn root_and_index_track_appends() {
        let svc = service(4).await;
        let before = svc.get_root_and_index().await.unwrap();
        assert_eq!(before.next_index, 0);

        svc.append(FieldElement::from_u64(1)).await.unwrap();
        let after = svc.get_root_and_index().await.unwrap();
        assert_eq!(after.next_index, 1);
        assert_ne!(after.root, before.root);
    }
}
