//! Auth Adapter (C10)
//!
//! Three schemes, selected by `AuthMode` at startup: bearer-token equality,
//! signed-JWT verification, and HMAC over the raw request body. All three
//! reduce to the same contract — given a request, produce a `Principal` or
//! fail with `RelayerError::AuthFailure` — so the axum middleware doesn't
//! need to know which scheme is active.

use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use sha2::Sha256;

use crate::common::error::RelayerError;
use crate::config::AuthMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Authenticate a request against the configured scheme.
///
/// `authorization_header` is the raw `Authorization` header value (used by
/// bearer and JWT modes); `signature_header` is the raw signature header
/// value (used by HMAC mode, conventionally `X-Signature`); `raw_body` is the
/// exact bytes HMAC mode signs over.
pub fn authenticate(
    mode: &AuthMode,
    authorization_header: Option<&str>,
    signature_header: Option<&str>,
    raw_body: &[u8],
) -> Result<Principal, RelayerError> {
    match mode {
        AuthMode::Bearer { token } => authenticate_bearer(token, authorization_header),
        AuthMode::Jwt { secret } => authenticate_jwt(secret, authorization_header),
        AuthMode::Hmac { secret } => authenticate_hmac(secret, signature_header, raw_body),
    }
}

fn authenticate_bearer(expected: &str, header: Option<&str>) -> Result<Principal, RelayerError> {
    let presented = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| RelayerError::auth_failure("missing bearer token"))?;

    if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        Ok(Principal { subject: "bearer".to_string() })
    } else {
        Err(RelayerError::auth_failure("bearer token mismatch"))
    }
}

fn authenticate_jwt(secret: &str, header: Option<&str>) -> Result<Principal, RelayerError> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| RelayerError::auth_failure("missing JWT"))?;

    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| RelayerError::auth_failure(format!("invalid JWT: {e}")))?;

    Ok(Principal { subject: data.claims.sub })
}

fn authenticate_hmac(secret: &str, signature_header: Option<&str>, raw_body: &[u8]) -> Result<Principal, RelayerError> {
    let presented_hex = signature_header.ok_or_else(|| RelayerError::auth_failure("missing signature header"))?;
    let presented = hex::decode(presented_hex.trim_start_matches("0x"))
        .map_err(|_| RelayerError::auth_failure("signature header is not valid hex"))?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| RelayerError::fatal("HMAC key of invalid length"))?;
    mac.update(raw_body);

    mac.verify_slice(&presented)
        .map_err(|_| RelayerError::auth_failure("HMAC signature mismatch"))?;

    Ok(Principal { subject: "hmac".to_string() })
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_accepts_matching_token() {
        let mode = AuthMode::Bearer { token: "secret-token".to_string() };
        let p = authenticate(&mode, Some("Bearer secret-token"), None, b"").unwrap();
        assert_eq!(p.subject, "bearer");
    }

    #[test]
    fn bearer_rejects_mismatched_token() {
        let mode = AuthMode::Bearer { token: "secret-token".to_string() };
        let err = authenticate(&mode, Some("Bearer wrong"), None, b"").unwrap_err();
        assert!(matches!(err, RelayerError::AuthFailure(_)));
    }

    #[test]
    fn bearer_rejects_missing_header() {
        let mode = AuthMode::Bearer { token: "secret-token".to_string() };
        assert!(authenticate(&mode, None, None, b"").is_err());
    }

    #[test]
    fn hmac_accepts_matching_signature() {
        let secret = "hmac-secret";
        let body = b"{\"commitment\":\"1\"}";
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());

        let mode = AuthMode::Hmac { secret: secret.to_string() };
        let p = authenticate(&mode, None, Some(sig.as_str()), body).unwrap();
        assert_eq!(p.subject, "hmac");
    }

    #[test]
    fn hmac_rejects_tampered_body() {
        let secret = "hmac-secret";
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(b"original");
        let sig = hex::encode(mac.finalize().into_bytes());

        let mode = AuthMode::Hmac { secret: secret.to_string() };
        let err = authenticate(&mode, None, Some(sig.as_str()), b"tampered").unwrap_err();
        assert!(matches!(err, RelayerError::AuthFailure(_)));
    }
}
