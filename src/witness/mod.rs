//! Witness/Prepare Service (C7)
//!
//! Three read-only operations that hand a client everything it needs to
//! build a deposit/transfer/withdraw zk-proof witness. The root returned
//! alongside each path is the root the path is valid against at the moment
//! of the call; no lock is held between this read and the client's eventual
//! submission (see spec §4.7 — staleness is tolerated by design).

use crate::field::FieldElement;
use crate::storage::MerklePath;
use crate::tree::{TreeError, TreeService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositWitness {
    pub merkle_root: FieldElement,
    pub next_leaf_index: u64,
    pub in_path_elements: Vec<FieldElement>,
    pub in_path_indices: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferWitness {
    pub merkle_root: FieldElement,
    pub next_leaf_index: u64,
    pub in_path_elements: Vec<FieldElement>,
    pub in_path_indices: Vec<u8>,
    pub out1_path_elements: Vec<FieldElement>,
    pub out1_path_indices: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawWitness {
    pub merkle_root: FieldElement,
    pub path_elements: Vec<FieldElement>,
    pub path_indices: Vec<u8>,
}

fn split(path: MerklePath) -> (Vec<FieldElement>, Vec<u8>) {
    (path.elements, path.bits)
}

pub struct WitnessService<'a> {
    tree: &'a TreeService,
}

impl<'a> WitnessService<'a> {
    pub fn new(tree: &'a TreeService) -> Self {
        WitnessService { tree }
    }

    /// The zero-leaf path at `next_index`, proving the strict-sync append
    /// slot is still empty. Public input for the deposit circuit is
    /// `merkle_root` (the pre-append root) — the ledger computes the new
    /// root from the witness, per the resolved Open Question in spec §9.
    pub async fn prepare_deposit(&self) -> Result<DepositWitness, TreeError> {
        let root_and_index = self.tree.get_root_and_index().await?;
        let path = self.tree.get_path_by_index(root_and_index.next_index).await?;
        let (elements, indices) = split(path);
        Ok(DepositWitness {
            merkle_root: root_and_index.root,
            next_leaf_index: root_and_index.next_index,
            in_path_elements: elements,
            in_path_indices: indices,
        })
    }

    /// `out1_commitment` isn't used to compute the append-preview path —
    /// that path is just the zero leaf at `next_index` — but it's part of
    /// the request shape the client is preparing a witness for, so it's
    /// accepted here for symmetry with §6's request body.
    pub async fn prepare_transfer(
        &self,
        in_commitment: FieldElement,
        _out1_commitment: FieldElement,
    ) -> Result<TransferWitness, TreeError> {
        let root_and_index = self.tree.get_root_and_index().await?;
        let (_in_index, in_path) = self.tree.get_path_by_commitment(in_commitment).await?;
        let out1_path = self.tree.get_path_by_index(root_and_index.next_index).await?;

        let (in_elements, in_indices) = split(in_path);
        let (out1_elements, out1_indices) = split(out1_path);

        Ok(TransferWitness {
            merkle_root: root_and_index.root,
            next_leaf_index: root_and_index.next_index,
            in_path_elements: in_elements,
            in_path_indices: in_indices,
            out1_path_elements: out1_elements,
            out1_path_indices: out1_indices,
        })
    }

    pub async fn prepare_withdraw(&self, spend_commitment: FieldElement) -> Result<WithdrawWitness, TreeError> {
        let root = self.tree.get_root().await?;
        let (_index, path) = self.tree.get_path_by_commitment(spend_commitment).await?;
        let (elements, indices) = split(path);
        Ok(WithdrawWitness {
            merkle_root: root,
            path_elements: elements,
            path_indices: indices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MerkleStore;
    use crate::storage::MemoryMerkleStore;
    use std::sync::Arc;

    async fn tree(depth: u8) -> TreeService {
        let store: Arc<dyn MerkleStore> = Arc::new(MemoryMerkleStore::new());
        store.init_tree(1, depth, 2000).await.unwrap();
        TreeService::new(1, store)
    }

    #[tokio::test]
    async fn prepare_deposit_targets_next_index() {
        let tree = tree(3).await;
        let witness = WitnessService::new(&tree).prepare_deposit().await.unwrap();
        assert_eq!(witness.next_leaf_index, 0);
        assert_eq!(witness.in_path_elements.len(), 3);
        assert_eq!(witness.in_path_indices, vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn prepare_withdraw_resolves_inclusion_path() {
        let tree = tree(3).await;
        let leaf = FieldElement::from_u64(42);
        tree.append(leaf).await.unwrap();

        let witness = WitnessService::new(&tree).prepare_withdraw(leaf).await.unwrap();
        assert_eq!(witness.path_elements.len(), 3);
    }

    #[tokio::test]
    async fn prepare_transfer_combines_inclusion_and_append_preview() {
        let tree = tree(3).await;
        let existing = FieldElement::from_u64(7);
        tree.append(existing).await.unwrap();

        let witness = WitnessService::new(&tree)
            .prepare_transfer(existing, FieldElement::from_u64(99))
            .await
            .unwrap();
        assert_eq!(witness.next_leaf_index, 1);
        assert_eq!(witness.out1_path_indices, vec![1, 0, 0]);
    }
}
