//! Auth middleware glue: extracts the relevant headers and raw body bytes,
//! hands them to `crate::auth::authenticate`, and rejects the request before
//! it reaches a handler on failure. HMAC mode needs the exact bytes the
//! client signed, so the body is buffered here and reconstructed for the
//! downstream handler rather than consumed twice.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::server::SharedAppState;
use crate::auth::authenticate;
use crate::common::error::RelayerError;

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub async fn require_auth(
    State(state): State<SharedAppState>,
    request: Request,
    next: Next,
) -> Result<Response, RelayerError> {
    let (parts, body) = request.into_parts();

    let authorization = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let signature = parts
        .headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| RelayerError::validation(format!("failed to read request body: {e}")))?;

    authenticate(&state.auth, authorization.as_deref(), signature.as_deref(), &bytes)?;

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}
