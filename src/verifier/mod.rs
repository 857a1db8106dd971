//! Proof Verifier (C6)
//!
//! Consumed as a black box per spec: a circuit tag, a proof, and a list of
//! public signals go in, a boolean comes out. No Groth16 arithmetic lives
//! here — wiring in a real verifying key is genuinely out of scope — but the
//! trait and its error type are real and the submit pipeline depends on
//! them directly.

use async_trait::async_trait;
use thiserror::Error;

use crate::field::FieldElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Circuit {
    Deposit,
    Transfer,
    Withdraw,
}

impl Circuit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Circuit::Deposit => "deposit",
            Circuit::Transfer => "transfer",
            Circuit::Withdraw => "withdraw",
        }
    }
}

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("proof rejected by verifier")]
    Rejected,

    #[error("malformed proof or public signals: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ProofVerifier: Send + Sync {
    async fn verify(
        &self,
        circuit: Circuit,
        proof: &[u8],
        public_signals: &[FieldElement],
    ) -> Result<bool, VerifierError>;
}

/// Test/dev verifier with a configurable accept/reject outcome. Never
/// inspects proof bytes; exists purely to let the submit pipeline be
/// exercised end to end without a real verifying key.
pub struct MockVerifier {
    accept: bool,
}

impl MockVerifier {
    pub fn accepting() -> Self {
        MockVerifier { accept: true }
    }

    pub fn rejecting() -> Self {
        MockVerifier { accept: false }
    }
}

#[async_trait]
impl ProofVerifier for MockVerifier {
    async fn verify(
        &self,
        _circuit: Circuit,
        proof: &[u8],
        public_signals: &[FieldElement],
    ) -> Result<bool, VerifierError> {
        if proof.is_empty() {
            return Err(VerifierError::Malformed("empty proof".into()));
        }
        if public_signals.is_empty() {
            return Err(VerifierError::Malformed("no public signals".into()));
        }
        Ok(self.accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepting_mock_returns_true() {
        let v = MockVerifier::accepting();
        let ok = v
            .verify(Circuit::Deposit, &[1, 2, 3], &[FieldElement::from_u64(1)])
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn rejecting_mock_returns_false() {
        let v = MockVerifier::rejecting();
        let ok = v
            .verify(Circuit::Withdraw, &[1], &[FieldElement::from_u64(1)])
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn malformed_input_is_an_error() {
        let v = MockVerifier::accepting();
        let err = v.verify(Circuit::Transfer, &[], &[FieldElement::from_u64(1)]).await;
        assert!(matches!(err, Err(VerifierError::Malformed(_))));
    }
}
