//! CipherPay Relayer - process entry point
//!
//! Loads configuration, opens the persistent Merkle store, spawns the
//! ledger event reconciler, and serves the HTTP surface until SIGINT/SIGTERM.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use cipherpay_relayer::api::{build_router, AppState};
use cipherpay_relayer::config::RelayerConfig;
use cipherpay_relayer::ledger::{LedgerClient, MockLedgerClient, SolanaLedgerClient};
use cipherpay_relayer::logging;
use cipherpay_relayer::metrics::Metrics;
use cipherpay_relayer::reconciler::{self, QueueEventSource};
use cipherpay_relayer::storage::{MerkleStore, SqliteMerkleStore};
use cipherpay_relayer::verifier::{MockVerifier, ProofVerifier};

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

    if let Err(e) = logging::init_from_config(&config) {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(1);
    }

    config.print_summary();

    let store: Arc<dyn MerkleStore> = match SqliteMerkleStore::new(&config.db_path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(target: "relayer::system", error = %e, "failed to open merkle store");
            std::process::exit(1);
        }
    };

    // The tree must already exist (see `tree-init`); a missing depth row
    // means this process must not serve traffic against an uninitialized
    // tree.
    if let Err(e) = store.get_depth(config.tree_id).await {
        tracing::error!(target: "relayer::system", error = %e, tree_id = config.tree_id, "tree not initialized, run tree-init first");
        std::process::exit(1);
    }

    let metrics = Arc::new(Metrics::new());

    // No concrete Groth16 verifying key ships with this crate; the verifier
    // is an external collaborator and MockVerifier stands in until one is
    // wired.
    let verifier: Arc<dyn ProofVerifier> = Arc::new(MockVerifier::accepting());

    let ledger: Arc<dyn LedgerClient> = match build_ledger_client(&config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(target: "relayer::system", error = %e, "failed to construct ledger client");
            std::process::exit(1);
        }
    };

    let reconcile_source = Arc::new(QueueEventSource::new());
    let reconciler_handle = tokio::spawn(reconciler::run(
        store.clone(),
        config.tree_id,
        reconcile_source,
        metrics.clone(),
        Duration::from_secs(5),
    ));

    let state = AppState::new(store, &config, verifier, ledger, metrics);
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(target: "relayer::system", error = %e, addr = %addr, "failed to bind HTTP listener");
            std::process::exit(1);
        }
    };

    tracing::info!(target: "relayer::system", addr = %addr, "relayer listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| tracing::error!(target: "relayer::system", error = %e, "HTTP server exited with error"));

    reconciler_handle.abort();
    tracing::info!(target: "relayer::system", "relayer shut down cleanly");
}

/// A real RPC endpoint and payer key builds `SolanaLedgerClient`; absent
/// those, fall back to `MockLedgerClient` so the relayer is still runnable
/// for local development against an in-memory/sqlite store.
fn build_ledger_client(config: &RelayerConfig) -> Result<Arc<dyn LedgerClient>, String> {
    match env::var("RELAYER_KEYPAIR_PATH") {
        Ok(path) => {
            let payer = load_keypair(&path)?;
            let client = SolanaLedgerClient::new(config.solana_rpc_url.clone(), &config.program_id, payer)
                .map_err(|e| e.to_string())?;
            Ok(Arc::new(client))
        }
        Err(_) => {
            tracing::warn!(target: "relayer::system", "RELAYER_KEYPAIR_PATH not set, using MockLedgerClient");
            Ok(Arc::new(MockLedgerClient::new()))
        }
    }
}

fn load_keypair(path: &str) -> Result<solana_sdk::signature::Keypair, String> {
    let bytes = std::fs::read_to_string(path).map_err(|e| format!("failed to read keypair file: {e}"))?;
    let values: Vec<u8> = serde_json::from_str(&bytes).map_err(|e| format!("keypair file is not a JSON byte array: {e}"))?;
    solana_sdk::signature::Keypair::from_bytes(&values).map_err(|e| format!("invalid keypair bytes: {e}"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!(target: "relayer::system", "shutdown signal received, draining");
}
