//! Structured Logging for the CipherPay Relayer
//!
//! Provides production-ready structured logging with:
//! - JSON output for log aggregation services (ELK, Datadog, etc.)
//! - Correlation IDs for request tracing
//! - Performance metrics
//! - Security event logging
//!
//! # Usage
//!
//! ```rust
//! use cipherpay_relayer::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?; // JSON mode for production
//!
//! info!(target: "relayer::api", correlation_id = %id, "processing deposit");
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

// ============================================================================
// Log Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// API request/response events
    Api,
    /// Deposit witness/submit events
    Deposit,
    /// Transfer witness/submit events
    Transfer,
    /// Withdraw witness/submit events
    Withdraw,
    /// Security events (auth, validation failures)
    Security,
    /// Ledger reconciliation and root divergence
    Reconcile,
    /// System events (startup, shutdown)
    System,
}

#[derive(Debug, Serialize)]
pub struct LogEvent {
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: format!("{:?}", level).to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!("{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}", self.message))
    }
}

// ============================================================================
// Domain Event Logging
// ============================================================================

pub fn log_security_event(
    event_type: &str,
    success: bool,
    details: serde_json::Value,
    correlation_id: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Warn };
    let event = LogEvent::new(level, EventCategory::Security, event_type)
        .with_data(serde_json::json!({ "success": success, "details": details }));

    let event = match correlation_id {
        Some(id) => event.with_correlation_id(id),
        None => event,
    };

    if success {
        tracing::info!(target: "relayer::security", "{}", event.to_json());
    } else {
        tracing::warn!(target: "relayer::security", "{}", event.to_json());
    }
}

pub fn log_api_request(method: &str, path: &str, client_ip: Option<&str>, correlation_id: &str) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::Api, format!("{method} {path}"))
        .with_correlation_id(correlation_id)
        .with_data(serde_json::json!({ "method": method, "path": path, "client_ip": client_ip }));

    tracing::info!(target: "relayer::api", "{}", event.to_json());
}

pub fn log_api_response(method: &str, path: &str, status: u16, duration_ms: u64, correlation_id: &str) {
    let level = if status >= 500 {
        LogLevel::Error
    } else if status >= 400 {
        LogLevel::Warn
    } else {
        LogLevel::Info
    };

    let event = LogEvent::new(level, EventCategory::Api, format!("{method} {path} -> {status}"))
        .with_correlation_id(correlation_id)
        .with_duration(duration_ms)
        .with_data(serde_json::json!({ "method": method, "path": path, "status": status }));

    match level {
        LogLevel::Error => tracing::error!(target: "relayer::api", "{}", event.to_json()),
        LogLevel::Warn => tracing::warn!(target: "relayer::api", "{}", event.to_json()),
        _ => tracing::info!(target: "relayer::api", "{}", event.to_json()),
    }
}

/// Log a deposit/transfer/withdraw submission outcome.
pub fn log_submit_event(
    category: EventCategory,
    event_type: &str,
    correlation_id: &str,
    tx_signature: Option<&str>,
    success: bool,
    error: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, category, event_type)
        .with_correlation_id(correlation_id)
        .with_data(serde_json::json!({
            "tx_signature": tx_signature,
            "success": success
        }));

    if let Some(err) = error {
        event = event.with_error("SUBMIT_ERROR", err);
    }

    let target = match category {
        EventCategory::Deposit => "relayer::deposit",
        EventCategory::Transfer => "relayer::transfer",
        EventCategory::Withdraw => "relayer::withdraw",
        _ => "relayer::submit",
    };

    if success {
        tracing::info!(target: target, "{}", event.to_json());
    } else {
        tracing::error!(target: target, "{}", event.to_json());
    }
}

/// Log a ledger reconciliation pass, including root divergence detection.
pub fn log_reconcile_event(tree_id: u32, inserted: u64, root_divergence: bool, recompute_divergence: bool) {
    let level = if root_divergence || recompute_divergence {
        LogLevel::Warn
    } else {
        LogLevel::Info
    };
    let event = LogEvent::new(level, EventCategory::Reconcile, "ledger reconciliation pass").with_data(serde_json::json!({
        "tree_id": tree_id,
        "inserted": inserted,
        "root_divergence": root_divergence,
        "recompute_divergence": recompute_divergence
    }));

    if level == LogLevel::Warn {
        tracing::warn!(target: "relayer::reconcile", "{}", event.to_json());
    } else {
        tracing::info!(target: "relayer::reconcile", "{}", event.to_json());
    }
}

// ============================================================================
// Initialization
// ============================================================================

pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "relayer={0},tower_http={0},axum={0}",
            format!("{:?}", level).to_lowercase()
        ))
    });

    if json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );
        subscriber.try_init().map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );
        subscriber.try_init().map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

pub fn init_from_config(config: &crate::config::RelayerConfig) -> Result<(), LoggingError> {
    let level = LogLevel::from(config.log_level.as_str());
    // JSON output once a real deployment profile is threaded through config;
    // pretty output is the right default for the single-profile relayer today.
    init_logging(level, false)
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

// ============================================================================
// Request ID Generation
// ============================================================================

pub fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().subsec_nanos();
    format!("{:x}-{:04x}", timestamp & 0xFFFFFFFF, (nanos % 65536) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(LogLevel::Info, EventCategory::Api, "test event")
            .with_correlation_id("test-123")
            .with_data(serde_json::json!({"key": "value"}))
            .with_duration(42);

        let json = event.to_json();
        assert!(json.contains("test event"));
        assert!(json.contains("test-123"));
        assert!(json.contains("42"));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::from("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from("unknown"), LogLevel::Info);
    }

    #[test]
    fn test_correlation_id_generation() {
        let id1 = generate_correlation_id();
        let id2 = generate_correlation_id();
        assert!(!id1.is_empty());
        assert!(!id2.is_empty());
    }
}
