//! Error Taxonomy for the CipherPay Relayer
//!
//! A single root error type implementing `std::error::Error` via `thiserror`,
//! carrying the taxonomy from spec §7, with a direct `IntoResponse` impl so
//! HTTP handlers can return `Result<T, RelayerError>` unchanged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;
use crate::tree::TreeError;
use crate::verifier::VerifierError;

#[derive(Debug, Error)]
pub enum RelayerError {
    /// Malformed request shape, out-of-range FE, malformed hex. 400, no state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// Commitment not in tree; transaction signature unknown. 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing/invalid credential. 401.
    #[error("authentication failure: {0}")]
    AuthFailure(String),

    /// Verifier rejected the proof. 400.
    #[error("proof rejected: {0}")]
    InvalidProof(String),

    /// Ledger RPC error, simulation failure, timeout. 502; caller may retry.
    #[error("ledger failure: {0}")]
    LedgerFailure(String),

    /// DB connection lost, deadlock. Retried once internally; 500 on second failure.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Misconfigured schema, missing Poseidon parameters, missing depth row.
    /// The process should not have started serving traffic; surfaced as 500
    /// if it's somehow reached at request time.
    #[error("fatal configuration error: {0}")]
    Fatal(String),
}

impl RelayerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn auth_failure(msg: impl Into<String>) -> Self {
        Self::AuthFailure(msg.into())
    }

    pub fn invalid_proof(msg: impl Into<String>) -> Self {
        Self::InvalidProof(msg.into())
    }

    pub fn ledger_failure(msg: impl Into<String>) -> Self {
        Self::LedgerFailure(msg.into())
    }

    pub fn storage_failure(msg: impl Into<String>) -> Self {
        Self::StorageFailure(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Stable machine-readable code for the JSON error body.
    pub fn error_code(&self) -> &'static str {
        match self {
            RelayerError::Validation(_) => "VALIDATION_ERROR",
            RelayerError::NotFound(_) => "NOT_FOUND",
            RelayerError::AuthFailure(_) => "AUTH_FAILURE",
            RelayerError::InvalidProof(_) => "PROOF_INVALID",
            RelayerError::LedgerFailure(_) => "LEDGER_FAILURE",
            RelayerError::StorageFailure(_) => "STORAGE_FAILURE",
            RelayerError::Fatal(_) => "FATAL",
        }
    }

    /// Storage and ledger failures may be retried by the caller per §7's
    /// propagation policy; validation/auth/proof rejections never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayerError::LedgerFailure(_) | RelayerError::StorageFailure(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            RelayerError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayerError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayerError::AuthFailure(_) => StatusCode::UNAUTHORIZED,
            RelayerError::InvalidProof(_) => StatusCode::BAD_REQUEST,
            RelayerError::LedgerFailure(_) => StatusCode::BAD_GATEWAY,
            RelayerError::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayerError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for RelayerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            code: self.error_code(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for RelayerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => RelayerError::not_found(format!("tree {id}")),
            StorageError::CommitmentNotFound(id) => {
                RelayerError::not_found(format!("commitment not in tree {id}"))
            }
            StorageError::InvalidData(msg) => RelayerError::validation(msg),
            StorageError::Database(msg) | StorageError::Connection(msg) => {
                RelayerError::storage_failure(msg)
            }
            StorageError::Fatal(msg) => RelayerError::fatal(msg),
        }
    }
}

impl From<TreeError> for RelayerError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::CommitmentNotFound { tree_id } => {
                RelayerError::not_found(format!("commitment not in tree {tree_id}"))
            }
            TreeError::IndexNotFound { tree_id, index } => {
                RelayerError::not_found(format!("index {index} not in tree {tree_id}"))
            }
            TreeError::Storage(e) => e.into(),
        }
    }
}

impl From<VerifierError> for RelayerError {
    fn from(e: VerifierError) -> Self {
        match e {
            VerifierError::Rejected => RelayerError::invalid_proof("proof rejected"),
            VerifierError::Malformed(msg) => RelayerError::invalid_proof(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(RelayerError::validation("x").error_code(), "VALIDATION_ERROR");
        assert_eq!(RelayerError::not_found("x").error_code(), "NOT_FOUND");
        assert_eq!(RelayerError::auth_failure("x").error_code(), "AUTH_FAILURE");
    }

    #[test]
    fn only_transient_layers_are_retryable() {
        assert!(RelayerError::ledger_failure("timeout").is_retryable());
        assert!(RelayerError::storage_failure("deadlock").is_retryable());
        assert!(!RelayerError::validation("bad input").is_retryable());
        assert!(!RelayerError::invalid_proof("bad proof").is_retryable());
    }
}
