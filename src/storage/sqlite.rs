//! SQLite Persistent Merkle Store
//!
//! Durable storage for `merkle_meta` / `leaves` / `nodes` / `roots`, backed
//! by a pooled `rusqlite` connection via `r2d2`.
//!
//! SQLite has no native row-level lock, so the row lock on
//! `merkle_meta.next_index` is realized two ways together: a
//! per-`(store, tree_id)` `tokio::sync::Mutex<()>` serializes writers within
//! this process, and `BEGIN IMMEDIATE` serializes against any other process
//! sharing the same database file.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use super::traits::{
    LedgerDeposit, MerklePath, MerkleStore, ReconcileOutcome, StorageError, StorageResult,
};
use crate::field::FieldElement;
use crate::poseidon::{hash2, zero_cache};

const ROOT_RING_SIZE: i64 = 128;

fn fe_blob(fe: &FieldElement) -> Vec<u8> {
    fe.to_be_bytes().to_vec()
}

fn blob_fe(bytes: &[u8]) -> Result<FieldElement, StorageError> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StorageError::InvalidData(format!("expected 32-byte FE, got {}", bytes.len())))?;
    Ok(FieldElement::from_be_bytes(&arr))
}

pub struct SqliteMerkleStore {
    pool: Pool<SqliteConnectionManager>,
    locks: std::sync::Mutex<HashMap<u32, Arc<AsyncMutex<()>>>>,
}

impl SqliteMerkleStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self {
            pool,
            locks: std::sync::Mutex::new(HashMap::new()),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self {
            pool,
            locks: std::sync::Mutex::new(HashMap::new()),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool.get().map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn tree_lock(&self, tree_id: u32) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        locks
            .entry(tree_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS merkle_meta (
                tree_id INTEGER PRIMARY KEY,
                depth INTEGER NOT NULL,
                next_index INTEGER NOT NULL,
                root BLOB,
                zero BLOB NOT NULL,
                roots_next_slot INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS leaves (
                tree_id INTEGER NOT NULL,
                leaf_index INTEGER NOT NULL,
                fe BLOB NOT NULL,
                fe_hex TEXT NOT NULL,
                PRIMARY KEY (tree_id, leaf_index)
            );
            CREATE INDEX IF NOT EXISTS idx_leaves_hex ON leaves(tree_id, fe_hex);

            CREATE TABLE IF NOT EXISTS nodes (
                tree_id INTEGER NOT NULL,
                node_layer INTEGER NOT NULL,
                node_index INTEGER NOT NULL,
                fe BLOB NOT NULL,
                fe_hex TEXT NOT NULL,
                PRIMARY KEY (tree_id, node_layer, node_index)
            );
            CREATE INDEX IF NOT EXISTS idx_nodes_hex ON nodes(tree_id, fe_hex);

            CREATE TABLE IF NOT EXISTS roots (
                tree_id INTEGER NOT NULL,
                slot_index INTEGER NOT NULL,
                fe BLOB NOT NULL,
                fe_hex TEXT NOT NULL,
                UNIQUE (tree_id, slot_index)
            );
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    fn meta_row(conn: &Connection, tree_id: u32) -> Result<Option<(u8, u64, Option<FieldElement>, FieldElement, i64)>, StorageError> {
        conn.query_row(
            "SELECT depth, next_index, root, zero, roots_next_slot FROM merkle_meta WHERE tree_id = ?1",
            params![tree_id],
            |row| {
                let depth: i64 = row.get(0)?;
                let next_index: i64 = row.get(1)?;
                let root: Option<Vec<u8>> = row.get(2)?;
                let zero: Vec<u8> = row.get(3)?;
                let slot: i64 = row.get(4)?;
                Ok((depth, next_index, root, zero, slot))
            },
        )
        .optional()
        .map_err(|e| StorageError::Database(e.to_string()))?
        .map(|(depth, next_index, root, zero, slot)| {
            let root_fe = root.map(|b| blob_fe(&b)).transpose()?;
            let zero_fe = blob_fe(&zero)?;
            Ok((depth as u8, next_index as u64, root_fe, zero_fe, slot))
        })
        .transpose()
    }

    fn node_or_zero(conn: &Connection, tree_id: u32, layer: u8, index: u64) -> Result<FieldElement, StorageError> {
        let row: Option<Vec<u8>> = if layer == 0 {
            conn.query_row(
                "SELECT fe FROM leaves WHERE tree_id = ?1 AND leaf_index = ?2",
                params![tree_id, index as i64],
                |r| r.get(0),
            )
        } else {
            conn.query_row(
                "SELECT fe FROM nodes WHERE tree_id = ?1 AND node_layer = ?2 AND node_index = ?3",
                params![tree_id, layer as i64, index as i64],
                |r| r.get(0),
            )
        }
        .optional()
        .map_err(|e| StorageError::Database(e.to_string()))?;

        match row {
            Some(bytes) => blob_fe(&bytes),
            None => Ok(zero_cache().get(layer as usize)),
        }
    }

    fn write_root_ring(conn: &Connection, tree_id: u32, slot: i64, root: FieldElement) -> Result<(), StorageError> {
        let blob = fe_blob(&root);
        let hex = root.to_hex_be();
        conn.execute(
            "INSERT INTO roots (tree_id, slot_index, fe, fe_hex) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(tree_id, slot_index) DO UPDATE SET fe = excluded.fe, fe_hex = excluded.fe_hex",
            params![tree_id, slot, blob, hex],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        let next_slot = (slot + 1) % ROOT_RING_SIZE;
        conn.execute(
            "UPDATE merkle_meta SET root = ?2, roots_next_slot = ?3 WHERE tree_id = ?1",
            params![tree_id, fe_blob(&root), next_slot],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn put_leaf_sync(conn: &Connection, tree_id: u32, index: u64, value: FieldElement) -> Result<(), StorageError> {
        conn.execute(
            "INSERT INTO leaves (tree_id, leaf_index, fe, fe_hex) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(tree_id, leaf_index) DO UPDATE SET fe = excluded.fe, fe_hex = excluded.fe_hex",
            params![tree_id, index as i64, fe_blob(&value), value.to_hex_be()],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    fn put_node_sync(conn: &Connection, tree_id: u32, layer: u8, index: u64, value: FieldElement) -> Result<(), StorageError> {
        conn.execute(
            "INSERT INTO nodes (tree_id, node_layer, node_index, fe, fe_hex) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(tree_id, node_layer, node_index) DO UPDATE SET fe = excluded.fe, fe_hex = excluded.fe_hex",
            params![tree_id, layer as i64, index as i64, fe_blob(&value), value.to_hex_be()],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    /// Recompute every ancestor of `index` given its just-written leaf
    /// value, writing each new node, and return the final root.
    fn recompute_from_leaf(conn: &Connection, tree_id: u32, depth: u8, index: u64) -> Result<FieldElement, StorageError> {
        let mut cur = index;
        let mut value = Self::node_or_zero(conn, tree_id, 0, cur)?;
        for layer in 0..depth {
            let sibling_index = cur ^ 1;
            let sibling = Self::node_or_zero(conn, tree_id, layer, sibling_index)?;
            let is_left = cur % 2 == 0;
            let parent = if is_left {
                hash2(value, sibling)
            } else {
                hash2(sibling, value)
            };
            cur >>= 1;
            Self::put_node_sync(conn, tree_id, layer + 1, cur, parent)?;
            value = parent;
        }
        Ok(value)
    }

    fn path_by_index_sync(conn: &Connection, tree_id: u32, depth: u8, index: u64) -> Result<MerklePath, StorageError> {
        let mut elements = Vec::with_capacity(depth as usize);
        let mut bits = Vec::with_capacity(depth as usize);
        let mut cur = index;
        for layer in 0..depth {
            let is_left = cur % 2 == 0;
            let sibling_index = cur ^ 1;
            elements.push(Self::node_or_zero(conn, tree_id, layer, sibling_index)?);
            bits.push(if is_left { 0 } else { 1 });
            cur >>= 1;
        }
        Ok(MerklePath { elements, bits })
    }

    /// Bulk-insert `count` rows of `node_layer = layer` (or `layer = None`
    /// for the `leaves` table) all sharing the same zero-subtree value,
    /// `chunk_size` rows per statement, starting at `node_index = start`.
    fn bulk_insert_zero_rows(
        tx: &Connection,
        tree_id: u32,
        layer: Option<u8>,
        start: u64,
        count: u64,
        value: &FieldElement,
        chunk_size: usize,
    ) -> Result<(), StorageError> {
        let blob = fe_blob(value);
        let hex = value.to_hex_be();
        let mut idx = start;
        let end = start + count;
        while idx < end {
            let batch = chunk_size.min((end - idx) as usize);
            let sql = match layer {
                Some(_) => format!(
                    "INSERT INTO nodes (tree_id, node_layer, node_index, fe, fe_hex) VALUES {}",
                    vec!["(?,?,?,?,?)"; batch].join(",")
                ),
                None => format!(
                    "INSERT INTO leaves (tree_id, leaf_index, fe, fe_hex) VALUES {}",
                    vec!["(?,?,?,?)"; batch].join(",")
                ),
            };
            let mut stmt = tx.prepare(&sql).map_err(|e| StorageError::Database(e.to_string()))?;

            let mut owned: Vec<Box<dyn rusqlite::ToSql>> = Vec::with_capacity(batch * 5);
            for i in 0..batch {
                let node_index = idx + i as u64;
                owned.push(Box::new(tree_id));
                if let Some(layer) = layer {
                    owned.push(Box::new(layer as i64));
                }
                owned.push(Box::new(node_index as i64));
                owned.push(Box::new(blob.clone()));
                owned.push(Box::new(hex.clone()));
            }
            stmt.execute(rusqlite::params_from_iter(owned))
                .map_err(|e| StorageError::Database(e.to_string()))?;
            idx += batch as u64;
        }
        Ok(())
    }
}

#[async_trait]
impl MerkleStore for SqliteMerkleStore {
    async fn get_depth(&self, tree_id: u32) -> StorageResult<u8> {
        let conn = self.conn()?;
        Self::meta_row(&conn, tree_id)?
            .map(|(depth, _, _, _, _)| depth)
            .ok_or(StorageError::NotFound(tree_id))
    }

    async fn get_next_index(&self, tree_id: u32) -> StorageResult<u64> {
        let conn = self.conn()?;
        Ok(Self::meta_row(&conn, tree_id)?.map(|(_, next, _, _, _)| next).unwrap_or(0))
    }

    async fn get_root(&self, tree_id: u32) -> StorageResult<FieldElement> {
        let conn = self.conn()?;
        // Precedence per spec §4.3: merkle_meta.root, else the most recent
        // ring slot, else merkle_meta.zero, else zeros(depth)[depth]. In
        // practice `zero` is always present once a tree is initialized, so
        // (d) only matters for a tree whose meta row predates that column
        // being populated.
        let (depth, _, root, zero, slot) = Self::meta_row(&conn, tree_id)?.ok_or(StorageError::NotFound(tree_id))?;
        if let Some(r) = root {
            return Ok(r);
        }
        let prev_slot = (slot + ROOT_RING_SIZE - 1) % ROOT_RING_SIZE;
        let ring: Option<Vec<u8>> = conn
            .query_row(
                "SELECT fe FROM roots WHERE tree_id = ?1 AND slot_index = ?2",
                params![tree_id, prev_slot],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        if let Some(bytes) = ring {
            return blob_fe(&bytes);
        }
        if depth == 0 {
            return Ok(zero);
        }
        Ok(zero_cache().get(depth as usize))
    }

    async fn set_root(&self, tree_id: u32, root: FieldElement) -> StorageResult<()> {
        let guard = self.tree_lock(tree_id);
        let _permit = guard.lock().await;

        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let (depth, _, _, _, slot) = Self::meta_row(&tx, tree_id)?.ok_or(StorageError::NotFound(tree_id))?;
        Self::write_root_ring(&tx, tree_id, slot, root)?;
        tx.commit().map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_leaf(&self, tree_id: u32, index: u64) -> StorageResult<FieldElement> {
        let conn = self.conn()?;
        Self::node_or_zero(&conn, tree_id, 0, index)
    }

    async fn put_leaf(&self, tree_id: u32, index: u64, value: FieldElement) -> StorageResult<()> {
        let conn = self.conn()?;
        Self::put_leaf_sync(&conn, tree_id, index, value)
    }

    async fn get_node(&self, tree_id: u32, layer: u8, index: u64) -> StorageResult<FieldElement> {
        let conn = self.conn()?;
        Self::node_or_zero(&conn, tree_id, layer, index)
    }

    async fn put_node(&self, tree_id: u32, layer: u8, index: u64, value: FieldElement) -> StorageResult<()> {
        let conn = self.conn()?;
        Self::put_node_sync(&conn, tree_id, layer, index, value)
    }

    async fn find_leaf_index(&self, tree_id: u32, commitment: FieldElement) -> StorageResult<Option<u64>> {
        let conn = self.conn()?;
        let idx: Option<i64> = conn
            .query_row(
                "SELECT leaf_index FROM leaves WHERE tree_id = ?1 AND fe_hex = ?2",
                params![tree_id, commitment.to_hex_be()],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(idx.map(|v| v as u64))
    }

    async fn append_and_recompute(&self, tree_id: u32, value: FieldElement) -> StorageResult<u64> {
        let guard = self.tree_lock(tree_id);
        let _permit = guard.lock().await;

        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let (depth, next_index, _, _, _) = Self::meta_row(&tx, tree_id)?.ok_or(StorageError::NotFound(tree_id))?;
        if next_index >= 1u64 << depth {
            return Err(StorageError::InvalidData(format!("tree {tree_id} is full at depth {depth}")));
        }

        Self::put_leaf_sync(&tx, tree_id, next_index, value)?;
        let new_root = Self::recompute_from_leaf(&tx, tree_id, depth, next_index)?;

        let (_, _, _, _, slot) = Self::meta_row(&tx, tree_id)?.ok_or(StorageError::NotFound(tree_id))?;
        Self::write_root_ring(&tx, tree_id, slot, new_root)?;

        tx.execute(
            "UPDATE merkle_meta SET next_index = ?2 WHERE tree_id = ?1",
            params![tree_id, (next_index + 1) as i64],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        tx.commit().map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(next_index)
    }

    async fn get_path_by_index(&self, tree_id: u32, index: u64) -> StorageResult<MerklePath> {
        let conn = self.conn()?;
        let depth = Self::meta_row(&conn, tree_id)?
            .map(|(depth, ..)| depth)
            .ok_or(StorageError::NotFound(tree_id))?;
        Self::path_by_index_sync(&conn, tree_id, depth, index)
    }

    async fn record_ledger_deposit(&self, tree_id: u32, event: &LedgerDeposit) -> StorageResult<ReconcileOutcome> {
        let guard = self.tree_lock(tree_id);
        let _permit = guard.lock().await;

        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let (depth, _, _, _, slot) = Self::meta_row(&tx, tree_id)?.ok_or(StorageError::NotFound(tree_id))?;

        let current_root = {
            let root_row: Option<Vec<u8>> = tx
                .query_row("SELECT root FROM merkle_meta WHERE tree_id = ?1", params![tree_id], |r| r.get(0))
                .map_err(|e| StorageError::Database(e.to_string()))?;
            match root_row {
                Some(bytes) => blob_fe(&bytes)?,
                None => zero_cache().get(depth as usize),
            }
        };
        let root_divergence = current_root != event.old_root;

        Self::put_leaf_sync(&tx, tree_id, event.insert_index, event.commitment)?;
        let recomputed = Self::recompute_from_leaf(&tx, tree_id, depth, event.insert_index)?;
        let recompute_divergence = recomputed != event.new_root;

        // The ledger's root is authoritative regardless of divergence.
        Self::write_root_ring(&tx, tree_id, slot, event.new_root)?;
        tx.execute(
            "UPDATE merkle_meta SET next_index = ?2 WHERE tree_id = ?1",
            params![tree_id, (event.insert_index + 1) as i64],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        tx.commit().map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(ReconcileOutcome {
            root_divergence,
            recompute_divergence,
        })
    }

    async fn init_tree(&self, tree_id: u32, depth: u8, chunk_size: usize) -> StorageResult<()> {
        let guard = self.tree_lock(tree_id);
        let _permit = guard.lock().await;

        let mut zeros = Vec::with_capacity(depth as usize + 1);
        for layer in 0..=depth as usize {
            zeros.push(zero_cache().get(layer));
        }

        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO merkle_meta (tree_id, depth, next_index, root, zero, roots_next_slot)
             VALUES (?1, ?2, 0, ?3, ?4, 0)
             ON CONFLICT(tree_id) DO UPDATE SET depth = excluded.depth, next_index = 0, root = excluded.root, zero = excluded.zero, roots_next_slot = 0",
            params![tree_id, depth as i64, fe_blob(&zeros[depth as usize]), fe_blob(&zeros[0])],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        tx.execute("DELETE FROM nodes WHERE tree_id = ?1", params![tree_id])
            .map_err(|e| StorageError::Database(e.to_string()))?;
        tx.execute("DELETE FROM leaves WHERE tree_id = ?1", params![tree_id])
            .map_err(|e| StorageError::Database(e.to_string()))?;

        for layer in 1..=depth {
            let count = 1u64 << (depth - layer);
            Self::bulk_insert_zero_rows(&tx, tree_id, Some(layer), 0, count, &zeros[layer as usize], chunk_size)?;
        }
        Self::bulk_insert_zero_rows(&tx, tree_id, None, 0, 1u64 << depth, &zeros[0], chunk_size)?;

        tx.commit().map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    async fn counts(&self, tree_id: u32) -> StorageResult<(u64, u64)> {
        let conn = self.conn()?;
        let nodes: i64 = conn
            .query_row("SELECT COUNT(*) FROM nodes WHERE tree_id = ?1", params![tree_id], |r| r.get(0))
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let leaves: i64 = conn
            .query_row("SELECT COUNT(*) FROM leaves WHERE tree_id = ?1", params![tree_id], |r| r.get(0))
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok((nodes as u64, leaves as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_tree_writes_expected_counts() {
        let store = SqliteMerkleStore::in_memory().unwrap();
        store.init_tree(1, 4, 8).await.unwrap();

        let (nodes, leaves) = store.counts(1).await.unwrap();
        assert_eq!(nodes, (1u64 << 4) - 1);
        assert_eq!(leaves, 1u64 << 4);
        assert_eq!(store.get_root(1).await.unwrap(), zero_cache().get(4));
    }

    #[tokio::test]
    async fn append_matches_manual_composition() {
        let store = SqliteMerkleStore::in_memory().unwrap();
        store.init_tree(1, 3, 2000).await.unwrap();

        let leaf = FieldElement::from_u64(42);
        let idx = store.append_and_recompute(1, leaf).await.unwrap();
        assert_eq!(idx, 0);

        let z1 = zero_cache().get(1);
        let z2 = zero_cache().get(2);
        let expected = hash2(hash2(leaf, zero_cache().get(0)), z1);
        let expected = hash2(expected, z2);
        assert_eq!(store.get_root(1).await.unwrap(), expected);
        assert_eq!(store.get_next_index(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn path_by_index_round_trips_to_root() {
        let store = SqliteMerkleStore::in_memory().unwrap();
        store.init_tree(1, 3, 2000).await.unwrap();
        let leaf = FieldElement::from_u64(7);
        store.append_and_recompute(1, leaf).await.unwrap();

        let path = store.get_path_by_index(1, 0).await.unwrap();
        let mut acc = leaf;
        for (sibling, bit) in path.elements.iter().zip(path.bits.iter()) {
            acc = if *bit == 0 { hash2(acc, *sibling) } else { hash2(*sibling, acc) };
        }
        assert_eq!(acc, store.get_root(1).await.unwrap());
    }

    #[tokio::test]
    async fn record_ledger_deposit_adopts_ledger_root() {
        let store = SqliteMerkleStore::in_memory().unwrap();
        store.init_tree(1, 3, 2000).await.unwrap();

        let bogus_root = FieldElement::from_u64(0xDEAD);
        let event = LedgerDeposit {
            insert_index: 0,
            commitment: FieldElement::from_u64(42),
            old_root: zero_cache().get(3),
            new_root: bogus_root,
        };
        let outcome = store.record_ledger_deposit(1, &event).await.unwrap();
        assert!(!outcome.root_divergence);
        assert!(outcome.recompute_divergence);
        assert_eq!(store.get_root(1).await.unwrap(), bogus_root);
    }

    #[tokio::test]
    async fn concurrent_appends_are_serialized() {
        let store = Arc::new(SqliteMerkleStore::new_for_test());
        store.init_tree(1, 8, 2000).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append_and_recompute(1, FieldElement::from_u64(i)).await.unwrap()
            }));
        }
        let mut indices = Vec::new();
        for h in handles {
            indices.push(h.await.unwrap());
        }
        indices.sort_unstable();
        assert_eq!(indices, (0..16).collect::<Vec<_>>());
        assert_eq!(store.get_next_index(1).await.unwrap(), 16);
    }
}

#[cfg(test)]
impl SqliteMerkleStore {
    /// A file-backed temp store, needed for the concurrency test: the
    /// `:memory:` pool only ever hands out one physical connection, which
    /// would serialize the concurrent appends trivially and prove nothing.
    fn new_for_test() -> Self {
        let path = std::env::temp_dir().join(format!("cipherpay-relayer-test-{}.sqlite3", uuid_like()));
        Self::new(path).unwrap()
    }
}

#[cfg(test)]
fn uuid_like() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    nanos.wrapping_add(COUNTER.fetch_add(1, Ordering::Relaxed))
}
