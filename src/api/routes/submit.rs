//! Submit Routes (C8)
//!
//! Lift a proof bundle off the wire, run it through `SubmitPipeline`, and
//! translate the outcome (or the ledger's current status) back to JSON.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::validate_amount;
use crate::api::server::SharedAppState;
use crate::common::error::RelayerError;
use crate::submit::{ProofBundle, SubmitOutcome, SubmitPipeline};

fn decode_proof(hex_str: &str) -> Result<Vec<u8>, RelayerError> {
    hex::decode(hex_str.trim_start_matches("0x"))
        .map_err(|_| RelayerError::validation("proof is not valid hex"))
}

fn require_valid_amount(amount: u64, field_name: &str) -> Result<(), RelayerError> {
    let result = validate_amount(amount, 1, u64::MAX, field_name);
    if result.is_valid {
        Ok(())
    } else {
        Err(RelayerError::validation(result.errors.join("; ")))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub ok: bool,
    pub accepted: bool,
    pub tx_signature: String,
}

impl From<SubmitOutcome> for SubmitResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        SubmitResponse {
            ok: outcome.ok,
            accepted: outcome.ok,
            tx_signature: outcome.tx_signature,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitDepositRequest {
    pub proof: String,
    pub public_signals: Vec<String>,
    #[allow(dead_code)]
    pub deposit_hash: String,
    #[allow(dead_code)]
    pub commitment: String,
    pub amount: u64,
    pub token_mint: String,
    #[allow(dead_code)]
    pub memo: Option<String>,
}

pub async fn submit_deposit(
    State(state): State<SharedAppState>,
    Json(req): Json<SubmitDepositRequest>,
) -> Result<Json<SubmitResponse>, RelayerError> {
    require_valid_amount(req.amount, "amount")?;
    let bundle = ProofBundle { proof: decode_proof(&req.proof)?, public_signals: req.public_signals };
    let pipeline = SubmitPipeline::new(state.verifier.as_ref(), state.ledger.as_ref());

    let outcome = pipeline.submit_deposit(bundle, &req.token_mint, req.amount).await?;
    state.metrics.record_ledger_submit();
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransferRequest {
    pub proof: String,
    pub public_signals: Vec<String>,
    #[allow(dead_code)]
    pub nullifier: String,
    #[allow(dead_code)]
    pub out1_commitment: String,
    #[allow(dead_code)]
    pub out2_commitment: String,
}

pub async fn submit_transfer(
    State(state): State<SharedAppState>,
    Json(req): Json<SubmitTransferRequest>,
) -> Result<Json<SubmitResponse>, RelayerError> {
    let bundle = ProofBundle { proof: decode_proof(&req.proof)?, public_signals: req.public_signals };
    let pipeline = SubmitPipeline::new(state.verifier.as_ref(), state.ledger.as_ref());

    let outcome = pipeline.submit_transfer(bundle).await?;
    state.metrics.record_ledger_submit();
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitWithdrawRequest {
    pub proof: String,
    pub public_signals: Vec<String>,
    #[allow(dead_code)]
    pub nullifier: String,
    pub recipient: String,
    pub amount: u64,
    pub mint: String,
}

pub async fn submit_withdraw(
    State(state): State<SharedAppState>,
    Json(req): Json<SubmitWithdrawRequest>,
) -> Result<Json<SubmitResponse>, RelayerError> {
    require_valid_amount(req.amount, "amount")?;
    let bundle = ProofBundle { proof: decode_proof(&req.proof)?, public_signals: req.public_signals };
    let pipeline = SubmitPipeline::new(state.verifier.as_ref(), state.ledger.as_ref());

    let outcome = pipeline
        .submit_withdraw(bundle, &req.recipient, req.amount, &req.mint)
        .await?;
    state.metrics.record_ledger_submit();
    Ok(Json(outcome.into()))
}

#[derive(Debug, Serialize)]
pub struct MerkleRootResponse {
    pub root: String,
}

pub async fn get_merkle_root(State(state): State<SharedAppState>) -> Result<Json<MerkleRootResponse>, RelayerError> {
    let root = state.tree.get_root().await?;
    Ok(Json(MerkleRootResponse { root: root.to_hex_be() }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

pub async fn get_submit_status(
    State(state): State<SharedAppState>,
    Path(signature): Path<String>,
) -> Result<Json<StatusResponse>, RelayerError> {
    let status = state
        .ledger
        .get_signature_status(&signature)
        .await
        .map_err(|e| RelayerError::ledger_failure(e.to_string()))?;

    let status = match status {
        crate::ledger::SignatureStatus::Pending => "pending",
        crate::ledger::SignatureStatus::Confirmed => "confirmed",
        crate::ledger::SignatureStatus::Failed => "failed",
    };

    Ok(Json(StatusResponse { status: status.to_string() }))
}
