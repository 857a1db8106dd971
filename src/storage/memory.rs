//! In-Memory Merkle Store
//!
//! Thread-safe, process-local implementation of `MerkleStore`. Used by every
//! test that doesn't specifically exercise SQLite persistence, and by
//! `examples`/dev runs that don't need a durable mirror.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, RwLock};

use super::traits::{
    LedgerDeposit, MerklePath, MerkleStore, ReconcileOutcome, StorageError, StorageResult,
};
use crate::field::FieldElement;
use crate::poseidon::{hash2, zero_cache};

const ROOT_RING_SIZE: usize = 128;

struct TreeData {
    depth: u8,
    next_index: u64,
    root: Option<FieldElement>,
    roots: Vec<Option<FieldElement>>,
    roots_next_slot: usize,
    leaves: HashMap<u64, FieldElement>,
    nodes: HashMap<(u8, u64), FieldElement>,
    leaf_index_by_value: HashMap<FieldElement, u64>,
}

impl TreeData {
    fn new(depth: u8) -> Self {
        TreeData {
            depth,
            next_index: 0,
            root: None,
            roots: vec![None; ROOT_RING_SIZE],
            roots_next_slot: 0,
            leaves: HashMap::new(),
            nodes: HashMap::new(),
            leaf_index_by_value: HashMap::new(),
        }
    }

    fn node_or_zero(&self, layer: u8, index: u64) -> FieldElement {
        if layer == 0 {
            self.leaves
                .get(&index)
                .copied()
                .unwrap_or_else(|| zero_cache().get(0))
        } else {
            self.nodes
                .get(&(layer, index))
                .copied()
                .unwrap_or_else(|| zero_cache().get(layer as usize))
        }
    }

    fn current_root(&self) -> FieldElement {
        if let Some(r) = self.root {
            return r;
        }
        let prev_slot = (self.roots_next_slot + ROOT_RING_SIZE - 1) % ROOT_RING_SIZE;
        if let Some(r) = self.roots[prev_slot] {
            return r;
        }
        zero_cache().get(self.depth as usize)
    }

    fn write_root(&mut self, root: FieldElement) {
        self.roots[self.roots_next_slot] = Some(root);
        self.roots_next_slot = (self.roots_next_slot + 1) % ROOT_RING_SIZE;
        self.root = Some(root);
    }

    /// Recompute every ancestor of `index` from its current leaf value and
    /// write them, returning the new root.
    fn recompute_from_leaf(&mut self, index: u64) -> FieldElement {
        let mut cur = index;
        let mut value = self.node_or_zero(0, cur);
        for layer in 0..self.depth {
            let sibling_index = cur ^ 1;
            let sibling = self.node_or_zero(layer, sibling_index);
            let is_left = cur % 2 == 0;
            let parent = if is_left {
                hash2(value, sibling)
            } else {
                hash2(sibling, value)
            };
            cur >>= 1;
            self.nodes.insert((layer + 1, cur), parent);
            value = parent;
        }
        value
    }

    fn path_by_index(&self, index: u64) -> MerklePath {
        let mut elements = Vec::with_capacity(self.depth as usize);
        let mut bits = Vec::with_capacity(self.depth as usize);
        let mut cur = index;
        for layer in 0..self.depth {
            let is_left = cur % 2 == 0;
            let sibling_index = cur ^ 1;
            elements.push(self.node_or_zero(layer, sibling_index));
            bits.push(if is_left { 0 } else { 1 });
            cur >>= 1;
        }
        MerklePath { elements, bits }
    }
}

pub struct MemoryMerkleStore {
    trees: RwLock<HashMap<u32, TreeData>>,
    locks: std::sync::Mutex<HashMap<u32, Arc<AsyncMutex<()>>>>,
}

impl MemoryMerkleStore {
    pub fn new() -> Self {
        MemoryMerkleStore {
            trees: RwLock::new(HashMap::new()),
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn tree_lock(&self, tree_id: u32) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        locks
            .entry(tree_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

impl Default for MemoryMerkleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MerkleStore for MemoryMerkleStore {
    async fn get_depth(&self, tree_id: u32) -> StorageResult<u8> {
        let trees = self.trees.read().await;
        trees
            .get(&tree_id)
            .map(|t| t.depth)
            .ok_or(StorageError::NotFound(tree_id))
    }

    async fn get_next_index(&self, tree_id: u32) -> StorageResult<u64> {
        let trees = self.trees.read().await;
        Ok(trees.get(&tree_id).map(|t| t.next_index).unwrap_or(0))
    }

    async fn get_root(&self, tree_id: u32) -> StorageResult<FieldElement> {
        let trees = self.trees.read().await;
        match trees.get(&tree_id) {
            Some(t) => Ok(t.current_root()),
            None => Err(StorageError::NotFound(tree_id)),
        }
    }

    async fn set_root(&self, tree_id: u32, root: FieldElement) -> StorageResult<()> {
        let guard = self.tree_lock(tree_id);
        let _permit = guard.lock().await;
        let mut trees = self.trees.write().await;
        let tree = trees.get_mut(&tree_id).ok_or(StorageError::NotFound(tree_id))?;
        tree.write_root(root);
        Ok(())
    }

    async fn get_leaf(&self, tree_id: u32, index: u64) -> StorageResult<FieldElement> {
        let trees = self.trees.read().await;
        let tree = trees.get(&tree_id).ok_or(StorageError::NotFound(tree_id))?;
        Ok(tree.node_or_zero(0, index))
    }

    async fn put_leaf(&self, tree_id: u32, index: u64, value: FieldElement) -> StorageResult<()> {
        let mut trees = self.trees.write().await;
        let tree = trees.get_mut(&tree_id).ok_or(StorageError::NotFound(tree_id))?;
        tree.leaves.insert(index, value);
        tree.leaf_index_by_value.insert(value, index);
        Ok(())
    }

    async fn get_node(&self, tree_id: u32, layer: u8, index: u64) -> StorageResult<FieldElement> {
        let trees = self.trees.read().await;
        let tree = trees.get(&tree_id).ok_or(StorageError::NotFound(tree_id))?;
        Ok(tree.node_or_zero(layer, index))
    }

    async fn put_node(
        &self,
        tree_id: u32,
        layer: u8,
        index: u64,
        value: FieldElement,
    ) -> StorageResult<()> {
        let mut trees = self.trees.write().await;
        let tree = trees.get_mut(&tree_id).ok_or(StorageError::NotFound(tree_id))?;
        tree.nodes.insert((layer, index), value);
        Ok(())
    }

    async fn find_leaf_index(
        &self,
        tree_id: u32,
        commitment: FieldElement,
    ) -> StorageResult<Option<u64>> {
        let trees = self.trees.read().await;
        let tree = trees.get(&tree_id).ok_or(StorageError::NotFound(tree_id))?;
        Ok(tree.leaf_index_by_value.get(&commitment).copied())
    }

    async fn append_and_recompute(&self, tree_id: u32, value: FieldElement) -> StorageResult<u64> {
        let guard = self.tree_lock(tree_id);
        let _permit = guard.lock().await;

        let mut trees = self.trees.write().await;
        let tree = trees.get_mut(&tree_id).ok_or(StorageError::NotFound(tree_id))?;

        let index = tree.next_index;
        if index >= 1u64 << tree.depth {
            return Err(StorageError::InvalidData(format!(
                "tree {tree_id} is full at depth {}",
                tree.depth
            )));
        }

        tree.leaves.insert(index, value);
        tree.leaf_index_by_value.insert(value, index);
        let new_root = tree.recompute_from_leaf(index);
        tree.write_root(new_root);
        tree.next_index = index + 1;

        Ok(index)
    }

    async fn get_path_by_index(&self, tree_id: u32, index: u64) -> StorageResult<MerklePath> {
        let trees = self.trees.read().await;
        let tree = trees.get(&tree_id).ok_or(StorageError::NotFound(tree_id))?;
        Ok(tree.path_by_index(index))
    }

    async fn record_ledger_deposit(
        &self,
        tree_id: u32,
        event: &LedgerDeposit,
    ) -> StorageResult<ReconcileOutcome> {
        let guard = self.tree_lock(tree_id);
        let _permit = guard.lock().await;

        let mut trees = self.trees.write().await;
        let tree = trees.get_mut(&tree_id).ok_or(StorageError::NotFound(tree_id))?;

        let root_divergence = tree.current_root() != event.old_root;

        tree.leaves.insert(event.insert_index, event.commitment);
        tree.leaf_index_by_value
            .insert(event.commitment, event.insert_index);
        let recomputed = tree.recompute_from_leaf(event.insert_index);
        let recompute_divergence = recomputed != event.new_root;

        // The ledger's root is authoritative regardless of divergence.
        tree.write_root(event.new_root);
        tree.next_index = event.insert_index + 1;

        Ok(ReconcileOutcome {
            root_divergence,
            recompute_divergence,
        })
    }

    async fn init_tree(&self, tree_id: u32, depth: u8, _chunk_size: usize) -> StorageResult<()> {
        let mut trees = self.trees.write().await;
        let mut tree = TreeData::new(depth);
        tree.root = Some(zero_cache().get(depth as usize));
        trees.insert(tree_id, tree);
        Ok(())
    }

    async fn counts(&self, tree_id: u32) -> StorageResult<(u64, u64)> {
        let trees = self.trees.read().await;
        let tree = trees.get(&tree_id).ok_or(StorageError::NotFound(tree_id))?;
        // The in-memory store never materializes zero-valued entries —
        // report the theoretical full-tree counts the way a bulk-populated
        // SQLite store would, so initializer count checks are meaningful.
        let depth = tree.depth as u32;
        let nodes = (1u64 << depth) - 1;
        let leaves = 1u64 << depth;
        Ok((nodes, leaves))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_and_empty_root() {
        let store = MemoryMerkleStore::new();
        store.init_tree(1, 3, 2000).await.unwrap();
        assert_eq!(store.get_depth(1).await.unwrap(), 3);
        assert_eq!(store.get_next_index(1).await.unwrap(), 0);
        assert_eq!(store.get_root(1).await.unwrap(), zero_cache().get(3));
    }

    #[tokio::test]
    async fn append_updates_index_and_root() {
        let store = MemoryMerkleStore::new();
        store.init_tree(1, 3, 2000).await.unwrap();

        let leaf = FieldElement::from_u64(42);
        let idx = store.append_and_recompute(1, leaf).await.unwrap();
        assert_eq!(idx, 0);
        assert_eq!(store.get_next_index(1).await.unwrap(), 1);

        let z1 = zero_cache().get(1);
        let z2 = zero_cache().get(2);
        let expected = hash2(hash2(leaf, zero_cache().get(0)), z1);
        let expected = hash2(expected, z2);
        assert_eq!(store.get_root(1).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn path_by_index_matches_manual_composition() {
        let store = MemoryMerkleStore::new();
        store.init_tree(1, 3, 2000).await.unwrap();
        let leaf = FieldElement::from_u64(42);
        store.append_and_recompute(1, leaf).await.unwrap();

        let path = store.get_path_by_index(1, 0).await.unwrap();
        assert_eq!(path.bits, vec![0, 0, 0]);

        let mut acc = leaf;
        for (sibling, bit) in path.elements.iter().zip(path.bits.iter()) {
            acc = if *bit == 0 {
                hash2(acc, *sibling)
            } else {
                hash2(*sibling, acc)
            };
        }
        assert_eq!(acc, store.get_root(1).await.unwrap());
    }

    #[tokio::test]
    async fn find_leaf_index_by_commitment() {
        let store = MemoryMerkleStore::new();
        store.init_tree(1, 3, 2000).await.unwrap();
        let leaf = FieldElement::from_u64(7);
        store.append_and_recompute(1, leaf).await.unwrap();

        assert_eq!(store.find_leaf_index(1, leaf).await.unwrap(), Some(0));
        assert_eq!(
            store
                .find_leaf_index(1, FieldElement::from_u64(999))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn record_ledger_deposit_adopts_ledger_root_on_divergence() {
        let store = MemoryMerkleStore::new();
        store.init_tree(1, 3, 2000).await.unwrap();

        let bogus_new_root = FieldElement::from_u64(0xDEAD);
        let event = LedgerDeposit {
            insert_index: 0,
            commitment: FieldElement::from_u64(42),
            old_root: zero_cache().get(3),
            new_root: bogus_new_root,
        };

        let outcome = store.record_ledger_deposit(1, &event).await.unwrap();
        assert!(!outcome.root_divergence);
        assert!(outcome.recompute_divergence);
        assert_eq!(store.get_root(1).await.unwrap(), bogus_new_root);
        assert_eq!(store.get_next_index(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_appends_are_serialized() {
        let store = Arc::new(MemoryMerkleStore::new());
        store.init_tree(1, 8, 2000).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_and_recompute(1, FieldElement::from_u64(i))
                    .await
                    .unwrap()
            }));
        }
        let mut indices: Vec<u64> = Vec::new();
        for h in handles {
            indices.push(h.await.unwrap());
        }
        indices.sort_unstable();
        assert_eq!(indices, (0..16).collect::<Vec<_>>());
        assert_eq!(store.get_next_index(1).await.unwrap(), 16);
    }
}
