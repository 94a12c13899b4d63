use serde::{Deserialize, Serialize};

/// One entry from `getSignaturesForAddress`, newest-first per the RPC contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: String,
    pub block_time: Option<i64>,
}

/// A parsed token account balance, as exposed by `getParsedTokenAccounts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAccount {
    pub mint: String,
    pub ui_amount: Option<f64>,
}

/// One side of a `preTokenBalances`/`postTokenBalances` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub account_index: u32,
    pub mint: String,
    pub owner: Option<String>,
    pub ui_amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxMeta {
    pub err: Option<serde_json::Value>,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

/// A decoded `getParsedTransaction` response, trimmed to the fields the
/// classification pipeline needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTx {
    pub meta: TxMeta,
    /// Ordered account keys, matching the indices used in `meta`.
    pub account_keys: Vec<String>,
    pub block_time: Option<i64>,
}
