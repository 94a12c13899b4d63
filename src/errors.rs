use thiserror::Error;

/// Single error taxonomy for the service. Every subsystem catches at its own
/// boundary and converts into one of these variants before logging or
/// replying to a caller — nothing propagates out of a Monitor cycle or a
/// Push Hub connection handler as a raw library error.
#[derive(Debug, Error)]
pub enum BotError {
    /// Required configuration is missing or invalid. Fatal — aborts startup.
    #[error("configuration error: {0}")]
    ConfigMissing(String),

    /// A chain RPC call failed. Transient, isolated per call/wallet.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// A transaction payload could not be interpreted.
    #[error("parse error: {0}")]
    Parse(String),

    /// A Store write failed. The caller must not mark the signature seen.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A subscriber frame was malformed or named an unknown message kind.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An unexpected internal condition. Logged with context, never panics.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BotError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigMissing(msg.into())
    }

    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::Rpc(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<sqlx::Error> for BotError {
    fn from(e: sqlx::Error) -> Self {
        BotError::Persistence(e.to_string())
    }
}

impl From<solana_client::client_error::ClientError> for BotError {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        BotError::Rpc(e.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::Parse(e.to_string())
    }
}

impl From<std::num::ParseIntError> for BotError {
    fn from(e: std::num::ParseIntError) -> Self {
        BotError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
