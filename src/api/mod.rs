//! API Layer Module
//!
//! HTTP server, routes, and middleware for the relayer's JSON surface.

pub mod auth_middleware;
pub mod middleware;
pub mod routes;
pub mod server;

// Re-exports for convenience
pub use middleware::{RateLimiter, RateLimitState, ValidationError};
pub use routes::build_router;
pub use server::{AppState, SharedAppState};
