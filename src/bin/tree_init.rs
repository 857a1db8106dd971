//! One-shot tree initializer.
//!
//! Run once per tree id before the relayer process starts serving traffic:
//! `tree-init` reads `RelayerConfig` from the environment and populates a
//! fresh depth-D tree with zero-subtree constants.

use std::sync::Arc;

use cipherpay_relayer::config::RelayerConfig;
use cipherpay_relayer::storage::{MerkleStore, SqliteMerkleStore};
use cipherpay_relayer::tree::TreeInitializer;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match RelayerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let store: Arc<dyn MerkleStore> = match SqliteMerkleStore::new(&config.db_path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("failed to open merkle store at {}: {e}", config.db_path);
            std::process::exit(1);
        }
    };

    let initializer = TreeInitializer::new(store);

    println!(
        "initializing tree {} at depth {} (chunk size {})",
        config.tree_id, config.tree_depth, config.bulk_chunk_size
    );

    match initializer.run(config.tree_id, config.tree_depth, config.bulk_chunk_size).await {
        Ok(()) => {
            println!("tree {} initialized", config.tree_id);
        }
        Err(e) => {
            eprintln!("tree initialization failed: {e}");
            std::process::exit(1);
        }
    }
}
