//! Environment-based Configuration for the CipherPay Relayer
//!
//! All sensitive values (auth secrets) MUST come from environment variables,
//! never from hardcoded values.
//!
//! # Environment Variables
//!
//! ## Storage
//! - `RELAYER_DB_PATH` - path to the SQLite database file
//! - `RELAYER_DB_POOL_SIZE` - r2d2 pool size (default: 8)
//!
//! ## Ledger
//! - `SOLANA_RPC_URL` - Solana RPC endpoint
//! - `PROGRAM_ID` - on-chain program id the relayer submits transactions against
//!
//! ## Tree
//! - `CP_TREE_DEPTH` - Merkle tree depth (default: 16)
//! - `CP_TREE_ID` - tree id this process serves (default: 1)
//! - `CP_BULK_CHUNK_SIZE` - rows per statement during tree init (default: 2000)
//!
//! ## Auth
//! - `AUTH_MODE` - "bearer", "jwt", or "hmac"
//! - `AUTH_BEARER_TOKEN` - required when `AUTH_MODE=bearer`
//! - `AUTH_JWT_SECRET` - required when `AUTH_MODE=jwt`
//! - `AUTH_HMAC_SECRET` - required when `AUTH_MODE=hmac`
//!
//! ## Ambient
//! - `RELAYER_LOG_LEVEL` - tracing filter (default: "info")
//! - `RELAYER_HTTP_PORT` - HTTP listen port (default: 8080)

use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("auth configuration incomplete: {0}")]
    AuthConfigIncomplete(String),
}

#[derive(Debug, Clone)]
pub enum AuthMode {
    Bearer { token: String },
    Jwt { secret: String },
    Hmac { secret: String },
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Bearer { .. } => "bearer",
            AuthMode::Jwt { .. } => "jwt",
            AuthMode::Hmac { .. } => "hmac",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub db_path: String,
    pub db_pool_size: u32,

    pub solana_rpc_url: String,
    pub program_id: String,

    pub tree_depth: u8,
    pub tree_id: u32,
    pub bulk_chunk_size: usize,

    pub auth: AuthMode,

    pub log_level: String,
    pub http_port: u16,
}

impl RelayerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = require_env("RELAYER_DB_PATH")?;
        let db_pool_size = parse_env_or("RELAYER_DB_POOL_SIZE", 8)?;

        let solana_rpc_url = require_env("SOLANA_RPC_URL")?;
        let program_id = require_env("PROGRAM_ID")?;

        let tree_depth = parse_env_or("CP_TREE_DEPTH", 16u8)?;
        let tree_id = parse_env_or("CP_TREE_ID", 1u32)?;
        let bulk_chunk_size = parse_env_or("CP_BULK_CHUNK_SIZE", 2000usize)?;

        let auth = load_auth_config()?;

        let log_level = env::var("RELAYER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let http_port = parse_env_or("RELAYER_HTTP_PORT", 8080u16)?;

        Ok(Self {
            db_path,
            db_pool_size,
            solana_rpc_url,
            program_id,
            tree_depth,
            tree_id,
            bulk_chunk_size,
            auth,
            log_level,
            http_port,
        })
    }

    /// Print configuration summary (hiding auth secrets).
    pub fn print_summary(&self) {
        println!("=== CipherPay Relayer Configuration ===");
        println!("DB Path: {}", self.db_path);
        println!("DB Pool Size: {}", self.db_pool_size);
        println!("Solana RPC: {}", self.solana_rpc_url);
        println!("Program ID: {}", self.program_id);
        println!("Tree: id={} depth={}", self.tree_id, self.tree_depth);
        println!("Auth Mode: {}", self.auth.as_str());
        println!("Log Level: {}", self.log_level);
        println!("HTTP Port: {}", self.http_port);
        println!("========================================");
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_env_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), v)),
        Err(_) => Ok(default),
    }
}

fn load_auth_config() -> Result<AuthMode, ConfigError> {
    let mode = env::var("AUTH_MODE").unwrap_or_else(|_| "bearer".to_string());

    match mode.to_lowercase().as_str() {
        "bearer" => {
            let token = env::var("AUTH_BEARER_TOKEN").map_err(|_| {
                ConfigError::AuthConfigIncomplete("AUTH_BEARER_TOKEN required".to_string())
            })?;
            Ok(AuthMode::Bearer { token })
        }
        "jwt" => {
            let secret = env::var("AUTH_JWT_SECRET").map_err(|_| {
                ConfigError::AuthConfigIncomplete("AUTH_JWT_SECRET required".to_string())
            })?;
            Ok(AuthMode::Jwt { secret })
        }
        "hmac" => {
            let secret = env::var("AUTH_HMAC_SECRET").map_err(|_| {
                ConfigError::AuthConfigIncomplete("AUTH_HMAC_SECRET required".to_string())
            })?;
            Ok(AuthMode::Hmac { secret })
        }
        other => Err(ConfigError::InvalidValue(
            "AUTH_MODE".to_string(),
            format!("unknown mode: {other} (use 'bearer', 'jwt', or 'hmac')"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_or_falls_back_to_default() {
        std::env::remove_var("CP_TREE_DEPTH_TEST_UNUSED");
        let v: u8 = parse_env_or("CP_TREE_DEPTH_TEST_UNUSED", 20).unwrap();
        assert_eq!(v, 20);
    }

    #[test]
    fn auth_mode_names_round_trip() {
        assert_eq!(AuthMode::Bearer { token: "x".into() }.as_str(), "bearer");
        assert_eq!(AuthMode::Jwt { secret: "x".into() }.as_str(), "jwt");
        assert_eq!(AuthMode::Hmac { secret: "x".into() }.as_str(), "hmac");
    }
}
