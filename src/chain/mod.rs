pub mod client;
pub mod types;

pub use client::{ChainClient, RpcChainClient};
pub use types::{ParsedTx, SignatureInfo, TokenAccount, TokenBalance, TxMeta};
