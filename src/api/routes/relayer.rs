//! Relayer Info & Metrics Routes (C10)

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::server::SharedAppState;
use crate::common::error::RelayerError;
use crate::metrics::MetricsSnapshot;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerInfoResponse {
    pub relayer_pubkey: String,
    pub program_id: String,
    pub cluster_url: String,
}

pub async fn get_relayer_info(State(state): State<SharedAppState>) -> Json<RelayerInfoResponse> {
    let info = state.ledger.info();
    Json(RelayerInfoResponse {
        relayer_pubkey: info.relayer_pubkey,
        program_id: info.program_id,
        cluster_url: info.cluster_url,
    })
}

/// Ambient debug endpoint exposing the in-process counters.
pub async fn get_metrics(State(state): State<SharedAppState>) -> Result<Json<MetricsSnapshot>, RelayerError> {
    Ok(Json(state.metrics.snapshot()))
}
