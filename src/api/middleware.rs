//! API Middleware - Input Validation and Rate Limiting
//!
//! Security middleware for the relayer's HTTP surface:
//! - Input validation for request parameters (field elements, hex, amounts)
//! - Rate limiting per IP/API key
//! - Security headers

use axum::{
    extract::{Extension, Request},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::field::FieldElement;

// ============================================================================
// Rate Limiting
// ============================================================================

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            burst: 20,
        }
    }
}

impl RateLimitConfig {
    /// Stricter config for submit endpoints, which trigger ledger RPCs.
    pub fn strict() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            burst: 5,
        }
    }

    /// Lenient config for read-only prepare/status endpoints.
    pub fn lenient() -> Self {
        Self {
            max_requests: 500,
            window: Duration::from_secs(60),
            burst: 100,
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
    burst_tokens: u32,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    entries: RwLock<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn check(&self, client_id: &str) -> Result<(), RateLimitError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let entry = entries.entry(client_id.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
            burst_tokens: self.config.burst,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
            entry.burst_tokens = self.config.burst.min(entry.burst_tokens + 5);
        }

        if entry.count < self.config.max_requests {
            entry.count += 1;
            Ok(())
        } else if entry.burst_tokens > 0 {
            entry.burst_tokens -= 1;
            entry.count += 1;
            Ok(())
        } else {
            let retry_after = self.config.window.as_secs() - now.duration_since(entry.window_start).as_secs();
            Err(RateLimitError::Exceeded { retry_after })
        }
    }

    pub async fn cleanup(&self) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let expiry = self.config.window * 2;
        entries.retain(|_, entry| now.duration_since(entry.window_start) < expiry);
    }
}

#[derive(Debug)]
pub enum RateLimitError {
    Exceeded { retry_after: u64 },
}

// ============================================================================
// Input Validation
// ============================================================================

#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, errors: vec![] }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self { is_valid: false, errors: vec![msg.into()] }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self
    }
}

/// Validate a decimal-string field element (the wire format circuits use
/// for commitments and public signals).
pub fn validate_field_decimal(input: &str, field_name: &str) -> ValidationResult {
    if input.is_empty() {
        return ValidationResult::error(format!("{field_name} is required"));
    }
    match FieldElement::from_decimal(input) {
        Ok(_) => ValidationResult::ok(),
        Err(e) => ValidationResult::error(format!("{field_name} is not a valid field element: {e}")),
    }
}

/// Validate a hex string, optionally enforcing a byte length.
pub fn validate_hex(input: &str, expected_len: Option<usize>, field_name: &str) -> ValidationResult {
    if input.is_empty() {
        return ValidationResult::error(format!("{field_name} is required"));
    }

    let hex_str = input.strip_prefix("0x").unwrap_or(input);

    if !hex_str.chars().all(|c| c.is_ascii_hexdigit()) {
        return ValidationResult::error(format!("{field_name} must be valid hex"));
    }

    if let Some(len) = expected_len {
        if hex_str.len() != len * 2 {
            return ValidationResult::error(format!(
                "{field_name} must be {len} bytes ({} hex characters)",
                len * 2
            ));
        }
    }

    ValidationResult::ok()
}

/// Validate an amount (lamports, token base units, etc.) against bounds.
pub fn validate_amount(amount: u64, min: u64, max: u64, field_name: &str) -> ValidationResult {
    if amount == 0 {
        return ValidationResult::error(format!("{field_name} must be greater than 0"));
    }
    if amount < min {
        return ValidationResult::error(format!("{field_name} must be at least {min}"));
    }
    if amount > max {
        return ValidationResult::error(format!("{field_name} must not exceed {max}"));
    }
    ValidationResult::ok()
}

// ============================================================================
// Middleware Types
// ============================================================================

pub type RateLimitState = Arc<RateLimiter>;

pub fn create_rate_limiter() -> RateLimitState {
    Arc::new(RateLimiter::new(RateLimitConfig::default()))
}

pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            return Some(value.split(',').next()?.trim().to_string());
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return Some(value.to_string());
        }
    }

    None
}

#[derive(Serialize)]
pub struct ValidationError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let status = if self.code.as_deref() == Some("RATE_LIMITED") {
            StatusCode::TOO_MANY_REQUESTS
        } else if self.code.as_deref() == Some("VALIDATION_ERROR") {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(self)).into_response()
    }
}

pub async fn rate_limit_middleware(
    headers: HeaderMap,
    Extension(rate_limiter): Extension<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, ValidationError> {
    let client_id = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());

    match rate_limiter.check(&client_id).await {
        Ok(()) => Ok(next.run(request).await),
        Err(RateLimitError::Exceeded { retry_after }) => Err(ValidationError {
            error: "rate limit exceeded".to_string(),
            code: Some("RATE_LIMITED".to_string()),
            details: vec![],
            retry_after: Some(retry_after),
        }),
    }
}

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());
    headers.insert("X-XSS-Protection", "1; mode=block".parse().unwrap());
    headers.insert("Strict-Transport-Security", "max-age=31536000; includeSubDomains".parse().unwrap());
    headers.insert("Content-Security-Policy", "default-src 'self'".parse().unwrap());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_decimal_validation() {
        assert!(validate_field_decimal("42", "commitment").is_valid);
        assert!(!validate_field_decimal("", "commitment").is_valid);
        assert!(!validate_field_decimal("not-a-number", "commitment").is_valid);
    }

    #[test]
    fn test_amount_validation() {
        assert!(validate_amount(1000, 100, 1_000_000, "amount").is_valid);
        assert!(!validate_amount(0, 100, 1_000_000, "amount").is_valid);
        assert!(!validate_amount(50, 100, 1_000_000, "amount").is_valid);
        assert!(!validate_amount(2_000_000, 100, 1_000_000, "amount").is_valid);
    }

    #[test]
    fn test_hex_validation() {
        assert!(validate_hex("abcdef1234", None, "test").is_valid);
        assert!(validate_hex("0xabcdef1234", None, "test").is_valid);
        assert!(validate_hex(
            "abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890",
            Some(32),
            "test"
        )
        .is_valid);

        assert!(!validate_hex("", None, "test").is_valid);
        assert!(!validate_hex("ghijk", None, "test").is_valid);
        assert!(!validate_hex("abcd", Some(32), "test").is_valid);
    }

    #[tokio::test]
    async fn test_rate_limiter() {
        let config = RateLimitConfig {
            max_requests: 3,
            window: Duration::from_secs(1),
            burst: 1,
        };
        let limiter = RateLimiter::new(config);

        assert!(limiter.check("client1").await.is_ok());
        assert!(limiter.check("client1").await.is_ok());
        assert!(limiter.check("client1").await.is_ok());
        assert!(limiter.check("client1").await.is_ok());
        assert!(limiter.check("client1").await.is_err());
        assert!(limiter.check("client2").await.is_ok());
    }
}
