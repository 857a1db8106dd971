//! Submit Pipeline (C8)
//!
//! For each of {deposit, transfer, withdraw}: validate request shape,
//! normalize public signals, verify the proof, hand off to the ledger
//! client, return `{ok, txSignature}`. The pipeline never mutates the tree —
//! the ledger is authoritative, and the event reconciler (`reconciler::`)
//! is what folds the ledger's state back into the mirror.

use crate::common::error::RelayerError;
use crate::field::FieldElement;
use crate::ledger::LedgerClient;
use crate::verifier::{Circuit, ProofVerifier};

/// Proof + public signals, as lifted off the wire. `public_signals` are
/// decimal strings, the circuits' native form.
pub struct ProofBundle {
    pub proof: Vec<u8>,
    pub public_signals: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub ok: bool,
    pub tx_signature: String,
}

pub struct SubmitPipeline<'a> {
    verifier: &'a dyn ProofVerifier,
    ledger: &'a dyn LedgerClient,
}

impl<'a> SubmitPipeline<'a> {
    pub fn new(verifier: &'a dyn ProofVerifier, ledger: &'a dyn LedgerClient) -> Self {
        SubmitPipeline { verifier, ledger }
    }

    /// Parse decimal-string public signals into `FieldElement`s, failing
    /// with `Validation` on the first malformed entry.
    fn normalize_signals(public_signals: &[String]) -> Result<Vec<FieldElement>, RelayerError> {
        public_signals
            .iter()
            .map(|s| FieldElement::from_decimal(s).map_err(|e| RelayerError::validation(e.to_string())))
            .collect()
    }

    /// Expected `publicSignals` length for a circuit, where the wire format
    /// fixes one. Deposit is 7 field elements (32 bytes each once serialized
    /// BE for the ledger payload); transfer/withdraw aren't length-checked
    /// here.
    fn expected_signal_count(circuit: Circuit) -> Option<usize> {
        match circuit {
            Circuit::Deposit => Some(7),
            Circuit::Transfer | Circuit::Withdraw => None,
        }
    }

    async fn verify(&self, circuit: Circuit, bundle: &ProofBundle) -> Result<Vec<FieldElement>, RelayerError> {
        if bundle.proof.is_empty() {
            return Err(RelayerError::validation("proof must not be empty"));
        }
        if bundle.public_signals.is_empty() {
            return Err(RelayerError::validation("publicSignals must not be empty"));
        }
        if let Some(expected) = Self::expected_signal_count(circuit) {
            if bundle.public_signals.len() != expected {
                return Err(RelayerError::validation(format!(
                    "publicSignals must have exactly {expected} elements, got {}",
                    bundle.public_signals.len()
                )));
            }
        }

        let signals = Self::normalize_signals(&bundle.public_signals)?;
        let accepted = self.verifier.verify(circuit, &bundle.proof, &signals).await?;
        if !accepted {
            return Err(RelayerError::invalid_proof("verifier rejected the proof"));
        }
        Ok(signals)
    }

    /// `publicSignals` for deposit is 7 field elements (§4.8), serialized BE
    /// 32 bytes each for the ledger payload.
    pub async fn submit_deposit(
        &self,
        bundle: ProofBundle,
        mint: &str,
        amount: u64,
    ) -> Result<SubmitOutcome, RelayerError> {
        let signals = self.verify(Circuit::Deposit, &bundle).await?;
        let public_inputs: Vec<u8> = signals.iter().flat_map(|fe| fe.to_be_bytes()).collect();

        let tx_signature = self
            .ledger
            .submit_deposit(&bundle.proof, &public_inputs, mint, amount)
            .await
            .map_err(|e| RelayerError::ledger_failure(e.to_string()))?;

        Ok(SubmitOutcome { ok: true, tx_signature })
    }

    pub async fn submit_transfer(&self, bundle: ProofBundle) -> Result<SubmitOutcome, RelayerError> {
        let signals = self.verify(Circuit::Transfer, &bundle).await?;
        let public_inputs: Vec<u8> = signals.iter().flat_map(|fe| fe.to_be_bytes()).collect();

        let tx_signature = self
            .ledger
            .submit_transfer(&bundle.proof, &public_inputs)
            .await
            .map_err(|e| RelayerError::ledger_failure(e.to_string()))?;

        Ok(SubmitOutcome { ok: true, tx_signature })
    }

    pub async fn submit_withdraw(
        &self,
        bundle: ProofBundle,
        recipient: &str,
        amount: u64,
        mint: &str,
    ) -> Result<SubmitOutcome, RelayerError> {
        let signals = self.verify(Circuit::Withdraw, &bundle).await?;
        let public_inputs: Vec<u8> = signals.iter().flat_map(|fe| fe.to_be_bytes()).collect();

        let tx_signature = self
            .ledger
            .submit_withdraw(&bundle.proof, &public_inputs, recipient, amount, mint)
            .await
            .map_err(|e| RelayerError::ledger_failure(e.to_string()))?;

        Ok(SubmitOutcome { ok: true, tx_signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedgerClient;
    use crate::verifier::MockVerifier;

    fn bundle() -> ProofBundle {
        ProofBundle {
            proof: vec![1, 2, 3, 4],
            public_signals: vec!["1".to_string(), "2".to_string()],
        }
    }

    fn deposit_bundle() -> ProofBundle {
        ProofBundle {
            proof: vec![1, 2, 3, 4],
            public_signals: (1..=7).map(|n| n.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn accepted_proof_submits_and_returns_signature() {
        let verifier = MockVerifier::accepting();
        let ledger = MockLedgerClient::new();
        let pipeline = SubmitPipeline::new(&verifier, &ledger);

        let outcome = pipeline
            .submit_deposit(deposit_bundle(), "11111111111111111111111111111111", 1000)
            .await
            .unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.tx_signature, "mock-deposit-signature");
    }

    #[tokio::test]
    async fn deposit_with_wrong_signal_count_is_a_validation_error() {
        let verifier = MockVerifier::accepting();
        let ledger = MockLedgerClient::new();
        let pipeline = SubmitPipeline::new(&verifier, &ledger);

        let err = pipeline
            .submit_deposit(bundle(), "11111111111111111111111111111111", 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayerError::Validation(_)));
    }

    #[tokio::test]
    async fn rejected_proof_fails_before_ledger_submit() {
        let verifier = MockVerifier::rejecting();
        let ledger = MockLedgerClient::new();
        let pipeline = SubmitPipeline::new(&verifier, &ledger);

        let err = pipeline
            .submit_transfer(bundle())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayerError::InvalidProof(_)));
    }

    #[tokio::test]
    async fn empty_proof_is_a_validation_error() {
        let verifier = MockVerifier::accepting();
        let ledger = MockLedgerClient::new();
        let pipeline = SubmitPipeline::new(&verifier, &ledger);

        let empty = ProofBundle { proof: vec![], public_signals: vec!["1".to_string()] };
        let err = pipeline
            .submit_withdraw(empty, "11111111111111111111111111111111", 500, "22222222222222222222222222222222")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayerError::Validation(_)));
    }

    #[tokio::test]
    async fn malformed_decimal_signal_is_a_validation_error() {
        let verifier = MockVerifier::accepting();
        let ledger = MockLedgerClient::new();
        let pipeline = SubmitPipeline::new(&verifier, &ledger);

        let malformed = ProofBundle { proof: vec![1], public_signals: vec!["not-a-number".to_string()] };
        let err = pipeline.submit_transfer(malformed).await.unwrap_err();
        assert!(matches!(err, RelayerError::Validation(_)));
    }
}
