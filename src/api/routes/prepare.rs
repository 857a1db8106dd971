//! Prepare/Witness Routes (C7)
//!
//! Read-only endpoints that hand a client the Merkle path it needs to build
//! a deposit/transfer/withdraw zk-proof witness.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::server::SharedAppState;
use crate::common::error::RelayerError;
use crate::field::FieldElement;
use crate::witness::WitnessService;

fn parse_fe(s: &str, field_name: &str) -> Result<FieldElement, RelayerError> {
    FieldElement::from_decimal(s).map_err(|e| RelayerError::validation(format!("{field_name}: {e}")))
}

fn path_hex(elements: &[FieldElement]) -> Vec<String> {
    elements.iter().map(|e| e.to_hex_be()).collect()
}

#[derive(Debug, Deserialize)]
pub struct PrepareDepositRequest {
    pub commitment: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositWitnessResponse {
    pub merkle_root: String,
    pub next_leaf_index: u64,
    pub in_path_elements: Vec<String>,
    pub in_path_indices: Vec<u8>,
}

/// The append-preview path doesn't depend on `commitment`'s value (see
/// `WitnessService::prepare_deposit`); it's still validated as a shape check
/// since a client sending garbage here has almost certainly built the rest
/// of the deposit request wrong too.
pub async fn prepare_deposit(
    State(state): State<SharedAppState>,
    Json(req): Json<PrepareDepositRequest>,
) -> Result<Json<DepositWitnessResponse>, RelayerError> {
    parse_fe(&req.commitment, "commitment")?;

    let witness = WitnessService::new(&state.tree).prepare_deposit().await?;
    Ok(Json(DepositWitnessResponse {
        merkle_root: witness.merkle_root.to_hex_be(),
        next_leaf_index: witness.next_leaf_index,
        in_path_elements: path_hex(&witness.in_path_elements),
        in_path_indices: witness.in_path_indices,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareTransferRequest {
    pub in_commitment: String,
    pub out1_commitment: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferWitnessResponse {
    pub merkle_root: String,
    pub next_leaf_index: u64,
    pub in_path_elements: Vec<String>,
    pub in_path_indices: Vec<u8>,
    pub out1_path_elements: Vec<String>,
    pub out1_path_indices: Vec<u8>,
}

pub async fn prepare_transfer(
    State(state): State<SharedAppState>,
    Json(req): Json<PrepareTransferRequest>,
) -> Result<Json<TransferWitnessResponse>, RelayerError> {
    let in_commitment = parse_fe(&req.in_commitment, "inCommitment")?;
    let out1_commitment = parse_fe(&req.out1_commitment, "out1Commitment")?;

    let witness = WitnessService::new(&state.tree)
        .prepare_transfer(in_commitment, out1_commitment)
        .await?;

    Ok(Json(TransferWitnessResponse {
        merkle_root: witness.merkle_root.to_hex_be(),
        next_leaf_index: witness.next_leaf_index,
        in_path_elements: path_hex(&witness.in_path_elements),
        in_path_indices: witness.in_path_indices,
        out1_path_elements: path_hex(&witness.out1_path_elements),
        out1_path_indices: witness.out1_path_indices,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareWithdrawRequest {
    pub spend_commitment: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawWitnessResponse {
    pub merkle_root: String,
    pub path_elements: Vec<String>,
    pub path_indices: Vec<u8>,
}

pub async fn prepare_withdraw(
    State(state): State<SharedAppState>,
    Json(req): Json<PrepareWithdrawRequest>,
) -> Result<Json<WithdrawWitnessResponse>, RelayerError> {
    let spend_commitment = parse_fe(&req.spend_commitment, "spendCommitment")?;

    let witness = WitnessService::new(&state.tree)
        .prepare_withdraw(spend_commitment)
        .await?;

    Ok(Json(WithdrawWitnessResponse {
        merkle_root: witness.merkle_root.to_hex_be(),
        path_elements: path_hex(&witness.path_elements),
        path_indices: witness.path_indices,
    }))
}
