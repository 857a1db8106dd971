//! Storage Layer Module
//!
//! Persistence for the Merkle mirror: meta, leaves, internal nodes, and the
//! 128-slot root ring buffer.
//!
//! This module contains:
//! - The `MerkleStore` trait definition
//! - A SQLite implementation for production
//! - An in-memory implementation for testing

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryMerkleStore;
pub use sqlite::SqliteMerkleStore;
pub use traits::{LedgerDeposit, MerklePath, MerkleStore, ReconcileOutcome, StorageError, StorageResult};
