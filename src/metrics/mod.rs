//! In-process metrics
//!
//! Lightweight atomic counters, queryable as JSON over
//! `GET /api/v1/relayer/metrics`. No histogram/dashboard backend is wired
//! up here — that integration is a contract for operators to fill in, not
//! something this crate implements.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide counters. One instance lives in `AppState`, shared via `Arc`.
#[derive(Default)]
pub struct Metrics {
    http_requests_total: AtomicU64,
    http_errors_total: AtomicU64,
    db_operations_total: AtomicU64,
    db_errors_total: AtomicU64,
    ledger_submits_total: AtomicU64,
    ledger_failures_total: AtomicU64,
    /// Reconciler root/recompute divergences that didn't block progress but
    /// indicate a critical misconfiguration (Poseidon parameters,
    /// endianness, tree init).
    merkle_divergence_total: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub http_requests_total: u64,
    pub http_errors_total: u64,
    pub db_operations_total: u64,
    pub db_errors_total: u64,
    pub ledger_submits_total: u64,
    pub ledger_failures_total: u64,
    pub merkle_divergence_total: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_http_request(&self) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_error(&self) {
        self.http_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_db_operation(&self) {
        self.db_operations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_db_error(&self) {
        self.db_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ledger_submit(&self) {
        self.ledger_submits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ledger_failure(&self) {
        self.ledger_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merkle_divergence(&self) {
        self.merkle_divergence_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            http_requests_total: self.http_requests_total.load(Ordering::Relaxed),
            http_errors_total: self.http_errors_total.load(Ordering::Relaxed),
            db_operations_total: self.db_operations_total.load(Ordering::Relaxed),
            db_errors_total: self.db_errors_total.load(Ordering::Relaxed),
            ledger_submits_total: self.ledger_submits_total.load(Ordering::Relaxed),
            ledger_failures_total: self.ledger_failures_total.load(Ordering::Relaxed),
            merkle_divergence_total: self.merkle_divergence_total.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = Metrics::new();
        let snap = m.snapshot();
        assert_eq!(snap.http_requests_total, 0);
        assert_eq!(snap.merkle_divergence_total, 0);
    }

    #[test]
    fn divergence_counter_increments() {
        let m = Metrics::new();
        m.record_merkle_divergence();
        m.record_merkle_divergence();
        assert_eq!(m.snapshot().merkle_divergence_total, 2);
    }
}
