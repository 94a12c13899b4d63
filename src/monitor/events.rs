use crate::db::models::{DailyPnl, Trade};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub sol_balance: f64,
    pub tokens: Vec<TokenBalanceView>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalanceView {
    pub mint: String,
    pub ui_amount: f64,
}

/// The three event kinds Monitor/PnL Aggregator publish to subscribers
/// (Push Hub foremost among them).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MonitorEvent {
    Trade { wallet: String, trade: Trade },
    Balance { wallet: String, snapshot: BalanceSnapshot },
    Pnl { wallet: String, daily_pnl: DailyPnl },
}

impl MonitorEvent {
    pub fn wallet(&self) -> &str {
        match self {
            MonitorEvent::Trade { wallet, .. } => wallet,
            MonitorEvent::Balance { wallet, .. } => wallet,
            MonitorEvent::Pnl { wallet, .. } => wallet,
        }
    }
}
