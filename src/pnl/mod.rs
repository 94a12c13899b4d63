use crate::clock::Clock;
use crate::db::models::{DailyPnl, DailyPnlUpdate, NewDailyPnl};
use crate::db::Store;
use crate::errors::Result;
use crate::monitor::events::MonitorEvent;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::instrument;

/// Per-wallet-per-day realized PnL counters, seeded from the prior day's
/// end balance. Ensure-row and apply-trade share one lock acquisition per
/// call so no caller observes a half-updated row.
pub struct PnlAggregator {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    cache: RwLock<HashMap<String, DailyPnl>>,
    events: broadcast::Sender<MonitorEvent>,
}

impl PnlAggregator {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, events: broadcast::Sender<MonitorEvent>) -> Self {
        Self {
            store,
            clock,
            cache: RwLock::new(HashMap::new()),
            events,
        }
    }

    #[instrument(skip(self))]
    async fn ensure_row(&self, wallet: &str, current_balance: Decimal) -> Result<DailyPnl> {
        let day_start = self.clock.day_start(self.clock.now());

        {
            let cache = self.cache.read().await;
            if let Some(row) = cache.get(wallet) {
                if row.date == day_start {
                    return Ok(row.clone());
                }
            }
        }

        if let Some(row) = self.store.get_daily_pnl(wallet, day_start).await? {
            self.cache.write().await.insert(wallet.to_string(), row.clone());
            return Ok(row);
        }

        let start_balance = match self.store.last_daily_pnl(wallet).await? {
            Some(previous) => previous.end_balance.unwrap_or(current_balance),
            None => current_balance,
        };

        let row = self
            .store
            .insert_daily_pnl(NewDailyPnl {
                wallet_address: wallet.to_string(),
                user_id: None,
                date: day_start,
                start_balance,
                end_balance: start_balance,
                realized_pnl: Decimal::ZERO,
                total_trades: 0,
            })
            .await?;

        self.cache.write().await.insert(wallet.to_string(), row.clone());
        Ok(row)
    }

    /// Applies one classified trade's effect on the wallet's daily row.
    #[instrument(skip(self))]
    pub async fn apply_trade(
        &self,
        wallet: &str,
        current_balance: Decimal,
        trade_pnl: Decimal,
        last_trade_id: Option<i64>,
    ) -> Result<DailyPnl> {
        // Ensure-row and apply-trade run under one held lock so no reader
        // observes the row between "ensured" and "updated".
        let day_start = self.clock.day_start(self.clock.now());
        let _row = self.ensure_row(wallet, current_balance).await?;

        let mut cache = self.cache.write().await;
        let existing = cache
            .get(wallet)
            .cloned()
            .ok_or_else(|| crate::errors::BotError::internal("daily pnl row missing after ensure"))?;

        let total_trades = if trade_pnl != Decimal::ZERO {
            existing.total_trades + 1
        } else {
            existing.total_trades
        };

        let updated = self
            .store
            .update_daily_pnl(
                wallet,
                day_start,
                DailyPnlUpdate {
                    end_balance: current_balance,
                    realized_pnl: existing.realized_pnl + trade_pnl,
                    total_trades,
                    last_trade_id,
                },
            )
            .await?;

        cache.insert(wallet.to_string(), updated.clone());
        drop(cache);

        let _ = self.events.send(MonitorEvent::Pnl {
            wallet: wallet.to_string(),
            daily_pnl: updated.clone(),
        });

        Ok(updated)
    }

    pub async fn cached(&self, wallet: &str) -> Option<DailyPnl> {
        self.cache.read().await.get(wallet).cloned()
    }
}
