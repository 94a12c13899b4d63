use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub display_name: String,
    pub wallet_address: String,
    pub stream_platform: Option<String>,
    pub is_live: bool,
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum TradeType {
    Buy,
    Sell,
    Deposit,
    Withdrawal,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "buy",
            TradeType::Sell => "sell",
            TradeType::Deposit => "deposit",
            TradeType::Withdrawal => "withdrawal",
        }
    }

    pub fn counts_toward_total_trades(&self) -> bool {
        matches!(self, TradeType::Buy | TradeType::Sell)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trade {
    pub id: i64,
    pub signature: String,
    pub wallet_address: String,
    pub user_id: Option<i64>,
    pub token_a: String,
    pub token_b: String,
    #[sqlx(rename = "type")]
    pub trade_type: TradeType,
    pub amount_a: Decimal,
    pub amount_b: Decimal,
    pub trade_pnl: Decimal,
    pub platform: String,
    pub raw_data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Fields needed to upsert a trade; `id` is assigned by the Store.
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub signature: String,
    pub wallet_address: String,
    pub user_id: Option<i64>,
    pub token_a: String,
    pub token_b: String,
    pub trade_type: TradeType,
    pub amount_a: Decimal,
    pub amount_b: Decimal,
    pub trade_pnl: Decimal,
    pub platform: String,
    pub raw_data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyPnl {
    pub id: i64,
    pub wallet_address: String,
    pub date: DateTime<Utc>,
    pub start_balance: Decimal,
    pub end_balance: Option<Decimal>,
    pub realized_pnl: Decimal,
    pub total_trades: i32,
    pub last_trade_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDailyPnl {
    pub wallet_address: String,
    pub user_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub start_balance: Decimal,
    pub end_balance: Decimal,
    pub realized_pnl: Decimal,
    pub total_trades: i32,
}

/// Partial update applied by `apply_trade`.
#[derive(Debug, Clone)]
pub struct DailyPnlUpdate {
    pub end_balance: Decimal,
    pub realized_pnl: Decimal,
    pub total_trades: i32,
    pub last_trade_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TokenMetaRow {
    pub id: i64,
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: Option<i32>,
    pub verified: bool,
    pub last_price: Option<Decimal>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewTokenMeta {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: Option<i32>,
    pub verified: bool,
}
