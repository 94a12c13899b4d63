use super::protocol::{EnrichedTrade, Snapshot};
use crate::clock::Clock;
use crate::db::Store;
use crate::errors::{BotError, Result};
use crate::token_meta::TokenMeta;
use rust_decimal::Decimal;

/// Builds the denormalized view for one wallet: user + last trade (both legs
/// enriched with token metadata) + today's PnL row + current balance.
pub async fn build_snapshot(store: &dyn Store, token_meta: &TokenMeta, clock: &dyn Clock, wallet: &str) -> Result<Snapshot> {
    let user = store
        .user_by_wallet(wallet)
        .await?
        .ok_or_else(|| BotError::internal(format!("no user for wallet {wallet}")))?;

    let last_trade = match store.latest_trade(wallet).await? {
        Some(trade) => {
            let token_a_meta = token_meta.get(&trade.token_a).await?;
            let token_b_meta = token_meta.get(&trade.token_b).await?;
            Some(EnrichedTrade { trade, token_a_meta, token_b_meta })
        }
        None => None,
    };

    let day_start = clock.day_start(clock.now());
    let daily_pnl = store.get_daily_pnl(wallet, day_start).await?;
    let balance = daily_pnl.as_ref().and_then(|p| p.end_balance).unwrap_or(Decimal::ZERO);

    Ok(Snapshot { user, last_trade, daily_pnl, balance })
}

/// Snapshot for every known user (not just currently-live ones), ordered by
/// `lastActive` descending — the frame sent on every new connection.
pub async fn build_users_list(store: &dyn Store, token_meta: &TokenMeta, clock: &dyn Clock) -> Result<Vec<Snapshot>> {
    let users = store.list_all_users().await?;
    let mut snapshots = Vec::with_capacity(users.len());
    for user in users {
        snapshots.push(build_snapshot(store, token_meta, clock, &user.wallet_address).await?);
    }
    Ok(snapshots)
}
