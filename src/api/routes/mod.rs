//! Route wiring for the relayer's HTTP surface.

pub mod health;
pub mod prepare;
pub mod relayer;
pub mod submit;

use axum::{middleware, routing::get, routing::post, Router};
use tower_http::cors::CorsLayer;

use crate::api::auth_middleware::require_auth;
use crate::api::middleware::{create_rate_limiter, rate_limit_middleware, security_headers_middleware};
use crate::api::server::SharedAppState;

pub fn build_router(state: SharedAppState) -> Router {
    let authenticated = Router::new()
        .route("/prepare/deposit", post(prepare::prepare_deposit))
        .route("/prepare/transfer", post(prepare::prepare_transfer))
        .route("/prepare/withdraw", post(prepare::prepare_withdraw))
        .route("/submit/deposit", post(submit::submit_deposit))
        .route("/submit/transfer", post(submit::submit_transfer))
        .route("/submit/withdraw", post(submit::submit_withdraw))
        .route("/submit/merkle/root", get(submit::get_merkle_root))
        .route("/submit/status/:sig", get(submit::get_submit_status))
        .route("/relayer/info", get(relayer::get_relayer_info))
        .route("/relayer/metrics", get(relayer::get_metrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api_v1 = Router::new().nest("/api/v1", authenticated);

    let unauthenticated = Router::new()
        .route("/health", get(health::health))
        .route("/healthz", get(health::health))
        .route("/ready", get(health::ready));

    let rate_limiter = create_rate_limiter();

    Router::new()
        .merge(api_v1)
        .merge(unauthenticated)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(rate_limiter))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
