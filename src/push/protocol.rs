use crate::db::models::{DailyPnl, Trade};
use crate::monitor::events::BalanceSnapshot;
use crate::token_meta::TokenMetaView;
use serde::{Deserialize, Serialize};

/// A trade enriched with both legs' token metadata, as sent over the wire.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedTrade {
    #[serde(flatten)]
    pub trade: Trade,
    #[serde(rename = "tokenAMeta")]
    pub token_a_meta: TokenMetaView,
    #[serde(rename = "tokenBMeta")]
    pub token_b_meta: TokenMetaView,
}

/// Denormalized per-wallet view sent to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub user: crate::db::models::User,
    #[serde(rename = "lastTrade")]
    pub last_trade: Option<EnrichedTrade>,
    #[serde(rename = "dailyPnl")]
    pub daily_pnl: Option<DailyPnl>,
    pub balance: rust_decimal::Decimal,
}

/// Frames a connected client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientFrame {
    #[serde(rename = "SUBSCRIBE_WALLET")]
    SubscribeWallet {
        #[serde(rename = "walletAddress")]
        wallet_address: String,
    },
    #[serde(rename = "UNSUBSCRIBE_WALLET")]
    UnsubscribeWallet {
        #[serde(rename = "walletAddress")]
        wallet_address: String,
    },
}

/// Frames the hub sends to one or all connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerFrame {
    #[serde(rename = "SUBSCRIBE_WALLET")]
    SubscribeAck {
        #[serde(rename = "walletAddress")]
        wallet_address: String,
        success: bool,
    },
    #[serde(rename = "UNSUBSCRIBE_WALLET")]
    UnsubscribeAck {
        #[serde(rename = "walletAddress")]
        wallet_address: String,
        success: bool,
    },
    #[serde(rename = "TRADE_UPDATE")]
    TradeUpdate { wallet: String, trade: Trade },
    #[serde(rename = "BALANCE_UPDATE")]
    BalanceUpdate { wallet: String, snapshot: BalanceSnapshot },
    #[serde(rename = "PNL_UPDATE")]
    PnlUpdate {
        wallet: String,
        #[serde(rename = "dailyPnl")]
        daily_pnl: DailyPnl,
    },
    #[serde(rename = "USERS_LIST")]
    UsersList { users: Vec<Snapshot> },
    #[serde(rename = "USERS_UPDATE")]
    UsersUpdate { snapshot: Snapshot },
    #[serde(rename = "ERROR")]
    Error { message: String },
}
