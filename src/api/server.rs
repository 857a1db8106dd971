//! API Server Module
//!
//! Provides the Axum application builder and server startup logic.
//! Consolidates application state and router configuration.

use std::sync::Arc;

use crate::config::{AuthMode, RelayerConfig};
use crate::ledger::LedgerClient;
use crate::metrics::Metrics;
use crate::storage::MerkleStore;
use crate::tree::TreeService;
use crate::verifier::ProofVerifier;

/// Combined application state for all API endpoints.
pub struct AppState {
    pub tree: TreeService,
    pub verifier: Arc<dyn ProofVerifier>,
    pub ledger: Arc<dyn LedgerClient>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthMode,
}

/// Shared application state type
pub type SharedAppState = Arc<AppState>;

impl AppState {
    pub fn new(
        store: Arc<dyn MerkleStore>,
        config: &RelayerConfig,
        verifier: Arc<dyn ProofVerifier>,
        ledger: Arc<dyn LedgerClient>,
        metrics: Arc<Metrics>,
    ) -> SharedAppState {
        Arc::new(Self {
            tree: TreeService::new(config.tree_id, store),
            verifier,
            ledger,
            metrics,
            auth: config.auth.clone(),
        })
    }
}
