use crate::constants::{
    DEFAULT_DB_MAX_CONNECTIONS, DEFAULT_MAX_CONCURRENT_RPC_REQUESTS, DEFAULT_PORT, DEFAULT_WS_PORT,
};
use crate::errors::{BotError, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub solana_rpc_url: String,
    pub database_url: String,
    pub port: u16,
    pub ws_port: u16,
    pub max_concurrent_rpc_requests: usize,
    pub database_max_connections: u32,
    pub rust_log: String,
    pub otel_exporter_otlp_endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            solana_rpc_url: env::var("SOLANA_RPC_URL")
                .map_err(|_| BotError::config("SOLANA_RPC_URL not set"))?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| BotError::config("DATABASE_URL not set"))?,
            port: Self::parse_or_default("PORT", DEFAULT_PORT),
            ws_port: Self::parse_or_default("WS_PORT", DEFAULT_WS_PORT),
            max_concurrent_rpc_requests: Self::parse_or_default(
                "MAX_CONCURRENT_RPC_REQUESTS",
                DEFAULT_MAX_CONCURRENT_RPC_REQUESTS,
            ),
            database_max_connections: Self::parse_or_default(
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DB_MAX_CONNECTIONS,
            ),
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            otel_exporter_otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
        })
    }

    fn parse_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
        env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn validate(&self) -> Result<()> {
        if self.solana_rpc_url.is_empty() {
            return Err(BotError::config("SOLANA_RPC_URL is required"));
        }
        if self.database_url.is_empty() {
            return Err(BotError::config("DATABASE_URL is required"));
        }
        if self.max_concurrent_rpc_requests == 0 {
            return Err(BotError::config("MAX_CONCURRENT_RPC_REQUESTS must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_default_falls_back() {
        std::env::remove_var("SOME_UNSET_KNOB_FOR_TEST");
        let v: u16 = Config::parse_or_default("SOME_UNSET_KNOB_FOR_TEST", 42);
        assert_eq!(v, 42);
    }
}
