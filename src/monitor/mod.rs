pub mod events;
pub mod state;

use crate::chain::ChainClient;
use crate::clock::Clock;
use crate::constants::{CYCLE_SIGNATURE_LIMIT, DUST_THRESHOLD, MONITOR_CYCLE_PERIOD, NATIVE_MINT, PRELOAD_SIGNATURE_COUNT};
use crate::db::models::{NewTrade, TradeType};
use crate::db::Store;
use crate::errors::{BotError, Result};
use crate::pnl::PnlAggregator;
use chrono::{TimeZone, Utc};
use events::{BalanceSnapshot, MonitorEvent, TokenBalanceView};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use state::{ActiveWalletSet, SeenSignatures, WalletState};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

/// One surviving balance delta: a mint and the signed change in the
/// wallet's holdings of it, in UI units.
struct TokenDelta {
    mint: String,
    change: f64,
}

/// Classifies a non-SOL delta against the wallet's SOL delta for the same
/// transaction. Buy/sell require the SOL side to move opposite the token
/// side; anything else is a plain transfer.
fn classify(token_change: f64, sol_change: f64) -> (TradeType, Decimal, &'static str) {
    if token_change > 0.0 && sol_change < 0.0 {
        (TradeType::Buy, Decimal::from_f64(sol_change).unwrap_or_default(), "unknown")
    } else if token_change < 0.0 && sol_change > 0.0 {
        (TradeType::Sell, Decimal::from_f64(sol_change).unwrap_or_default(), "unknown")
    } else if token_change > 0.0 {
        (TradeType::Deposit, Decimal::ZERO, "transfer")
    } else {
        (TradeType::Withdrawal, Decimal::ZERO, "transfer")
    }
}

/// Polls the chain for every live user's wallet on a fixed cadence,
/// classifies new signatures into trades, persists them, and publishes
/// `MonitorEvent`s for subscribers (the PnL Aggregator and Push Hub).
pub struct Monitor {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn Store>,
    pnl: Arc<PnlAggregator>,
    clock: Arc<dyn Clock>,
    active: ActiveWalletSet,
    seen: SeenSignatures,
    events_tx: broadcast::Sender<MonitorEvent>,
    stopped: Arc<AtomicBool>,
    last_cycle_at_ms: Arc<AtomicI64>,
}

impl Monitor {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn Store>,
        pnl: Arc<PnlAggregator>,
        clock: Arc<dyn Clock>,
        events_tx: broadcast::Sender<MonitorEvent>,
    ) -> Self {
        Self {
            chain,
            store,
            pnl,
            clock,
            active: ActiveWalletSet::default(),
            seen: SeenSignatures::default(),
            events_tx,
            stopped: Arc::new(AtomicBool::new(false)),
            last_cycle_at_ms: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events_tx.subscribe()
    }

    /// Milliseconds since Unix epoch when the last cycle completed, or 0 if
    /// no cycle has run yet. Used by the health endpoint to detect a stalled
    /// Monitor task.
    pub fn last_cycle_at_ms(&self) -> i64 {
        self.last_cycle_at_ms.load(Ordering::SeqCst)
    }

    /// Seeds the active wallet set and SeenSignatures before the first cycle
    /// runs, so `start()` never processes a wallet's entire history as if it
    /// were new.
    pub async fn initialize(&self) -> Result<()> {
        self.reconcile_active_wallets().await
    }

    /// Runs the cycle loop on a background task until `stop()` is called. A
    /// cycle that overruns its period does not queue a second one; the next
    /// tick simply fires late.
    pub async fn start(self: Arc<Self>) {
        let mut interval = tokio::time::interval(MONITOR_CYCLE_PERIOD);
        loop {
            interval.tick().await;
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            self.run_cycle().await;
        }
        debug!("monitor cycle loop stopped");
    }

    /// Requests the loop stop after its current cycle finishes.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn run_cycle(&self) {
        if let Err(e) = self.reconcile_active_wallets().await {
            error!(error = %e, "failed to reconcile active wallets");
        }

        for (wallet, state) in self.active.snapshot().await {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.process_wallet(&wallet, state.user_id).await {
                error!(wallet = %wallet, error = %e, "wallet cycle failed");
            }
            self.emit_balance_snapshot(&wallet).await;
        }

        self.last_cycle_at_ms.store(self.clock.now().timestamp_millis(), Ordering::SeqCst);
    }

    async fn reconcile_active_wallets(&self) -> Result<()> {
        let live = self.store.list_live_users().await?;
        let live_wallets: HashSet<String> = live.iter().map(|u| u.wallet_address.clone()).collect();
        self.active.retain_live(&live_wallets).await;

        for user in live {
            if self.active.contains(&user.wallet_address).await {
                continue;
            }
            let preload = self
                .store
                .latest_signatures_for_wallet(&user.wallet_address, PRELOAD_SIGNATURE_COUNT as i64)
                .await?;
            self.seen.preload(preload.iter().map(|(sig, _)| sig.clone())).await;
            let last_seen_signature = preload.into_iter().next().map(|(sig, _)| sig);
            self.active
                .insert(
                    user.wallet_address.clone(),
                    WalletState {
                        user_id: Some(user.id),
                        last_seen_signature,
                    },
                )
                .await;
        }
        Ok(())
    }

    async fn process_wallet(&self, wallet: &str, user_id: Option<i64>) -> Result<()> {
        let pubkey = Pubkey::from_str(wallet).map_err(|e| BotError::parse(format!("bad wallet address: {e}")))?;
        let signatures = self.chain.get_signatures_for_address(&pubkey, CYCLE_SIGNATURE_LIMIT).await?;
        let Some(newest) = signatures.first().map(|s| s.signature.clone()) else {
            return Ok(());
        };

        if self.active.last_seen_signature(wallet).await.as_deref() == Some(newest.as_str()) {
            return Ok(());
        }
        self.active.set_last_seen_signature(wallet, newest).await;

        let mut ordered = signatures;
        ordered.sort_by_key(|s| s.block_time);

        for info in &ordered {
            self.process_signature(wallet, user_id, info).await;
        }
        Ok(())
    }

    /// Never returns an error: every disposition (skip, persist, retry) is
    /// handled internally so one bad signature cannot stall the wallet.
    async fn process_signature(&self, wallet: &str, user_id: Option<i64>, info: &crate::chain::SignatureInfo) {
        let sig = &info.signature;
        if self.seen.contains(sig).await {
            return;
        }

        match self.store.trade_by_signature(sig).await {
            Ok(Some(_)) => {
                self.seen.insert(sig.clone()).await;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(signature = %sig, error = %e, "trade lookup failed, will retry next cycle");
                return;
            }
        }

        let Some(block_time) = info.block_time else {
            self.seen.insert(sig.clone()).await;
            return;
        };
        let Some(block_dt) = Utc.timestamp_opt(block_time, 0).single() else {
            self.seen.insert(sig.clone()).await;
            return;
        };

        let now = self.clock.now();
        if block_dt < self.clock.day_start(now) || block_dt > self.clock.day_end(now) {
            self.seen.insert(sig.clone()).await;
            return;
        }

        let parsed = match self.chain.get_parsed_transaction(sig).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                self.seen.insert(sig.clone()).await;
                return;
            }
            Err(BotError::Rpc(msg)) => {
                warn!(signature = %sig, error = %msg, "rpc fetch failed, will retry next cycle");
                return;
            }
            Err(e) => {
                warn!(signature = %sig, error = %e, "could not parse transaction, skipping");
                self.seen.insert(sig.clone()).await;
                return;
            }
        };

        if parsed.meta.err.is_some() {
            self.seen.insert(sig.clone()).await;
            return;
        }

        let Some(idx) = parsed.account_keys.iter().position(|k| k == wallet) else {
            self.seen.insert(sig.clone()).await;
            return;
        };

        let pre_lamports = parsed.meta.pre_balances.get(idx).copied().unwrap_or(0);
        let post_lamports = parsed.meta.post_balances.get(idx).copied().unwrap_or(0);
        let sol_change = (post_lamports as f64 - pre_lamports as f64) / 1e9;
        if sol_change.abs() < DUST_THRESHOLD {
            self.seen.insert(sig.clone()).await;
            return;
        }

        let deltas = token_deltas(wallet, &parsed);
        if deltas.is_empty() {
            self.seen.insert(sig.clone()).await;
            return;
        }

        // The schema keys trades by signature, so only the first surviving
        // non-native delta is persisted as this signature's trade.
        if deltas.len() > 1 {
            debug!(signature = %sig, extra = deltas.len() - 1, "dropping additional token deltas in multi-token transaction");
        }
        let delta = &deltas[0];

        let (trade_type, trade_pnl, platform) = classify(delta.change, sol_change);
        let amount_a = Decimal::from_f64(delta.change.abs()).unwrap_or_default();
        let (token_b, amount_b) = match trade_type {
            TradeType::Buy | TradeType::Sell => (NATIVE_MINT.to_string(), Decimal::from_f64(sol_change.abs()).unwrap_or_default()),
            TradeType::Deposit | TradeType::Withdrawal => (delta.mint.clone(), amount_a),
        };

        let new_trade = NewTrade {
            signature: sig.clone(),
            wallet_address: wallet.to_string(),
            user_id,
            token_a: delta.mint.clone(),
            token_b,
            trade_type,
            amount_a,
            amount_b,
            trade_pnl,
            platform: platform.to_string(),
            raw_data: None,
            timestamp: block_dt,
        };

        let persisted = match self.store.upsert_trade(new_trade).await {
            Ok(t) => t,
            Err(e) => {
                warn!(signature = %sig, error = %e, "failed to persist trade, will retry next cycle");
                return;
            }
        };

        let _ = self.events_tx.send(MonitorEvent::Trade {
            wallet: wallet.to_string(),
            trade: persisted.clone(),
        });

        if matches!(trade_type, TradeType::Buy | TradeType::Sell) {
            let post_sol = Decimal::from_f64(post_lamports as f64 / 1e9).unwrap_or_default();
            if let Err(e) = self.pnl.apply_trade(wallet, post_sol, trade_pnl, Some(persisted.id)).await {
                warn!(wallet = %wallet, error = %e, "failed to apply trade to daily pnl");
            }
        }

        self.seen.insert(sig.clone()).await;
    }

    async fn emit_balance_snapshot(&self, wallet: &str) {
        let pubkey = match Pubkey::from_str(wallet) {
            Ok(p) => p,
            Err(_) => return,
        };
        let sol_lamports = match self.chain.get_balance(&pubkey).await {
            Ok(b) => b,
            Err(e) => {
                warn!(wallet = %wallet, error = %e, "balance fetch failed");
                return;
            }
        };
        let tokens = match self.chain.get_parsed_token_accounts(&pubkey).await {
            Ok(accounts) => accounts
                .into_iter()
                .map(|a| TokenBalanceView {
                    mint: a.mint,
                    ui_amount: a.ui_amount.unwrap_or(0.0),
                })
                .collect(),
            Err(e) => {
                warn!(wallet = %wallet, error = %e, "token account fetch failed");
                Vec::new()
            }
        };

        let _ = self.events_tx.send(MonitorEvent::Balance {
            wallet: wallet.to_string(),
            snapshot: BalanceSnapshot {
                sol_balance: sol_lamports as f64 / 1e9,
                tokens,
                timestamp: self.clock.now(),
            },
        });
    }
}

/// Pairs pre/post token balances by account index for accounts owned by
/// `wallet`, including full exits (an account present pre-tx, absent post).
fn token_deltas(wallet: &str, parsed: &crate::chain::ParsedTx) -> Vec<TokenDelta> {
    let mut deltas = Vec::new();

    for post in &parsed.meta.post_token_balances {
        if post.owner.as_deref() != Some(wallet) {
            continue;
        }
        let pre_amount = parsed
            .meta
            .pre_token_balances
            .iter()
            .find(|p| p.account_index == post.account_index)
            .and_then(|p| p.ui_amount)
            .unwrap_or(0.0);
        let post_amount = post.ui_amount.unwrap_or(0.0);
        let change = post_amount - pre_amount;
        if change.abs() >= DUST_THRESHOLD && post.mint != NATIVE_MINT {
            deltas.push(TokenDelta { mint: post.mint.clone(), change });
        }
    }

    for pre in &parsed.meta.pre_token_balances {
        if pre.owner.as_deref() != Some(wallet) {
            continue;
        }
        let has_post = parsed.meta.post_token_balances.iter().any(|p| p.account_index == pre.account_index);
        if has_post {
            continue;
        }
        let pre_amount = pre.ui_amount.unwrap_or(0.0);
        if pre_amount > 0.0 && pre.mint != NATIVE_MINT {
            deltas.push(TokenDelta { mint: pre.mint.clone(), change: -pre_amount });
        }
    }

    deltas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_buy_when_token_up_sol_down() {
        let (kind, pnl, platform) = classify(12.0, -1.5);
        assert_eq!(kind, TradeType::Buy);
        assert_eq!(pnl, Decimal::from_f64(-1.5).unwrap());
        assert_eq!(platform, "unknown");
    }

    #[test]
    fn classify_sell_when_token_down_sol_up() {
        let (kind, pnl, platform) = classify(-12.0, 1.5);
        assert_eq!(kind, TradeType::Sell);
        assert_eq!(pnl, Decimal::from_f64(1.5).unwrap());
        assert_eq!(platform, "unknown");
    }

    #[test]
    fn classify_deposit_when_no_opposite_sol_move() {
        let (kind, pnl, platform) = classify(5.0, 0.0);
        assert_eq!(kind, TradeType::Deposit);
        assert_eq!(pnl, Decimal::ZERO);
        assert_eq!(platform, "transfer");
    }

    #[test]
    fn classify_withdrawal_when_token_leaves_without_sol_gain() {
        let (kind, _, platform) = classify(-5.0, 0.0);
        assert_eq!(kind, TradeType::Withdrawal);
        assert_eq!(platform, "transfer");
    }

    #[test]
    fn token_deltas_handles_full_exit() {
        use crate::chain::{ParsedTx, TokenBalance, TxMeta};
        let parsed = ParsedTx {
            meta: TxMeta {
                err: None,
                pre_balances: vec![0],
                post_balances: vec![0],
                pre_token_balances: vec![TokenBalance {
                    account_index: 1,
                    mint: "MintA".to_string(),
                    owner: Some("W".to_string()),
                    ui_amount: Some(10.0),
                }],
                post_token_balances: vec![],
            },
            account_keys: vec!["W".to_string()],
            block_time: Some(0),
        };
        let deltas = token_deltas("W", &parsed);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].mint, "MintA");
        assert_eq!(deltas[0].change, -10.0);
    }

    #[test]
    fn token_deltas_drops_dust() {
        use crate::chain::{ParsedTx, TokenBalance, TxMeta};
        let parsed = ParsedTx {
            meta: TxMeta {
                err: None,
                pre_balances: vec![0],
                post_balances: vec![0],
                pre_token_balances: vec![TokenBalance {
                    account_index: 1,
                    mint: "MintA".to_string(),
                    owner: Some("W".to_string()),
                    ui_amount: Some(10.0),
                }],
                post_token_balances: vec![TokenBalance {
                    account_index: 1,
                    mint: "MintA".to_string(),
                    owner: Some("W".to_string()),
                    ui_amount: Some(10.0000000001),
                }],
            },
            account_keys: vec!["W".to_string()],
            block_time: Some(0),
        };
        assert!(token_deltas("W", &parsed).is_empty());
    }

    fn single_delta_parsed(pre: f64, post: f64) -> crate::chain::ParsedTx {
        use crate::chain::{ParsedTx, TokenBalance, TxMeta};
        ParsedTx {
            meta: TxMeta {
                err: None,
                pre_balances: vec![0],
                post_balances: vec![0],
                pre_token_balances: vec![TokenBalance {
                    account_index: 1,
                    mint: "MintA".to_string(),
                    owner: Some("W".to_string()),
                    ui_amount: Some(pre),
                }],
                post_token_balances: vec![TokenBalance {
                    account_index: 1,
                    mint: "MintA".to_string(),
                    owner: Some("W".to_string()),
                    ui_amount: Some(post),
                }],
            },
            account_keys: vec!["W".to_string()],
            block_time: Some(0),
        }
    }

    #[test]
    fn token_deltas_boundary_just_under_dust_threshold_is_dropped() {
        let parsed = single_delta_parsed(0.0, DUST_THRESHOLD * 0.5);
        assert!(token_deltas("W", &parsed).is_empty());
    }

    #[test]
    fn token_deltas_boundary_at_dust_threshold_is_kept() {
        let parsed = single_delta_parsed(0.0, DUST_THRESHOLD);
        let deltas = token_deltas("W", &parsed);
        assert_eq!(deltas.len(), 1);
    }

    #[test]
    fn token_deltas_boundary_just_over_dust_threshold_is_kept() {
        let parsed = single_delta_parsed(0.0, DUST_THRESHOLD * 1.5);
        let deltas = token_deltas("W", &parsed);
        assert_eq!(deltas.len(), 1);
    }
}
