//! End-to-end scenarios driven entirely through the public API: a fake
//! `ChainClient` feeds canned signatures/transactions, a fake `Store` plays
//! the role of Postgres, and the Monitor/PnL Aggregator/Push Hub run exactly
//! as the Supervisor wires them. One monitor cycle is driven per test by
//! pausing tokio's clock and advancing past `MONITOR_CYCLE_PERIOD`.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use solana_wallet_tracker::chain::{ChainClient, ParsedTx, SignatureInfo, TokenAccount, TokenBalance, TxMeta};
use solana_wallet_tracker::clock::{Clock, FixedClock};
use solana_wallet_tracker::db::models::{
    DailyPnl, DailyPnlUpdate, NewDailyPnl, NewTokenMeta, NewTrade, TokenMetaRow, Trade, TradeType, User,
};
use solana_wallet_tracker::db::Store;
use solana_wallet_tracker::monitor::events::MonitorEvent;
use solana_wallet_tracker::monitor::Monitor;
use solana_wallet_tracker::pnl::PnlAggregator;
use solana_wallet_tracker::push::{PushHub, ServerFrame};
use solana_wallet_tracker::token_meta::TokenMeta;
use solana_wallet_tracker::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

fn wallet_one() -> String {
    solana_sdk::system_program::id().to_string()
}

fn wallet_two() -> String {
    solana_sdk::sysvar::clock::id().to_string()
}

fn today() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 27, 20, 0, 0).unwrap()
}

#[derive(Default)]
struct FakeStore {
    users: Mutex<Vec<User>>,
    trades: Mutex<HashMap<String, Trade>>,
    next_trade_id: Mutex<i64>,
    daily: Mutex<HashMap<(String, DateTime<Utc>), DailyPnl>>,
    next_pnl_id: Mutex<i64>,
    tokens: Mutex<HashMap<String, TokenMetaRow>>,
}

impl FakeStore {
    fn with_users(users: Vec<User>) -> Self {
        Self { users: Mutex::new(users), ..Default::default() }
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_live_users(&self) -> Result<Vec<User>> {
        Ok(self.users.lock().unwrap().iter().filter(|u| u.is_live).cloned().collect())
    }

    async fn list_all_users(&self) -> Result<Vec<User>> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn user_by_wallet(&self, wallet: &str) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.wallet_address == wallet).cloned())
    }

    async fn upsert_trade(&self, trade: NewTrade) -> Result<Trade> {
        let mut next_id = self.next_trade_id.lock().unwrap();
        *next_id += 1;
        let row = Trade {
            id: *next_id,
            signature: trade.signature.clone(),
            wallet_address: trade.wallet_address,
            user_id: trade.user_id,
            token_a: trade.token_a,
            token_b: trade.token_b,
            trade_type: trade.trade_type,
            amount_a: trade.amount_a,
            amount_b: trade.amount_b,
            trade_pnl: trade.trade_pnl,
            platform: trade.platform,
            raw_data: trade.raw_data,
            timestamp: trade.timestamp,
        };
        self.trades.lock().unwrap().insert(trade.signature, row.clone());
        Ok(row)
    }

    async fn trade_by_signature(&self, signature: &str) -> Result<Option<Trade>> {
        Ok(self.trades.lock().unwrap().get(signature).cloned())
    }

    async fn trade_by_id(&self, id: i64) -> Result<Option<Trade>> {
        Ok(self.trades.lock().unwrap().values().find(|t| t.id == id).cloned())
    }

    async fn latest_trade(&self, wallet: &str) -> Result<Option<Trade>> {
        Ok(self
            .trades
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.wallet_address == wallet)
            .max_by_key(|t| t.timestamp)
            .cloned())
    }

    async fn latest_signatures_for_wallet(&self, _wallet: &str, _limit: i64) -> Result<Vec<(String, DateTime<Utc>)>> {
        Ok(vec![])
    }

    async fn get_daily_pnl(&self, wallet: &str, day_start: DateTime<Utc>) -> Result<Option<DailyPnl>> {
        Ok(self.daily.lock().unwrap().get(&(wallet.to_string(), day_start)).cloned())
    }

    async fn insert_daily_pnl(&self, row: NewDailyPnl) -> Result<DailyPnl> {
        let mut next_id = self.next_pnl_id.lock().unwrap();
        *next_id += 1;
        let full = DailyPnl {
            id: *next_id,
            wallet_address: row.wallet_address.clone(),
            date: row.date,
            start_balance: row.start_balance,
            end_balance: Some(row.end_balance),
            realized_pnl: row.realized_pnl,
            total_trades: row.total_trades,
            last_trade_id: None,
            created_at: row.date,
            updated_at: row.date,
        };
        self.daily.lock().unwrap().insert((row.wallet_address, row.date), full.clone());
        Ok(full)
    }

    async fn update_daily_pnl(&self, wallet: &str, day_start: DateTime<Utc>, fields: DailyPnlUpdate) -> Result<DailyPnl> {
        let mut daily = self.daily.lock().unwrap();
        let row = daily.get_mut(&(wallet.to_string(), day_start)).expect("row must be ensured before update");
        row.end_balance = Some(fields.end_balance);
        row.realized_pnl = fields.realized_pnl;
        row.total_trades = fields.total_trades;
        row.last_trade_id = fields.last_trade_id;
        Ok(row.clone())
    }

    async fn last_daily_pnl(&self, wallet: &str) -> Result<Option<DailyPnl>> {
        Ok(self.daily.lock().unwrap().values().filter(|r| r.wallet_address == wallet).max_by_key(|r| r.date).cloned())
    }

    async fn token_by_address(&self, address: &str) -> Result<Option<TokenMetaRow>> {
        Ok(self.tokens.lock().unwrap().get(address).cloned())
    }

    async fn list_all_tokens(&self) -> Result<Vec<TokenMetaRow>> {
        Ok(self.tokens.lock().unwrap().values().cloned().collect())
    }

    async fn upsert_token(&self, token: NewTokenMeta) -> Result<TokenMetaRow> {
        let row = TokenMetaRow {
            id: 1,
            address: token.address.clone(),
            symbol: token.symbol,
            name: token.name,
            decimals: token.decimals,
            verified: token.verified,
            last_price: None,
            last_updated: None,
        };
        self.tokens.lock().unwrap().insert(token.address, row.clone());
        Ok(row)
    }

    async fn set_token_price(&self, _address: &str, _price: Decimal, _at: DateTime<Utc>) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeChainClient {
    signatures: Mutex<HashMap<String, Vec<SignatureInfo>>>,
    transactions: Mutex<HashMap<String, ParsedTx>>,
}

impl FakeChainClient {
    fn with_signatures(wallet: &str, infos: Vec<SignatureInfo>, txs: Vec<(String, ParsedTx)>) -> Self {
        let mut signatures = HashMap::new();
        signatures.insert(wallet.to_string(), infos);
        Self { signatures: Mutex::new(signatures), transactions: Mutex::new(txs.into_iter().collect()) }
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn get_balance(&self, _address: &Pubkey) -> Result<u64> {
        Ok(0)
    }

    async fn get_parsed_token_accounts(&self, _address: &Pubkey) -> Result<Vec<TokenAccount>> {
        Ok(vec![])
    }

    async fn get_signatures_for_address(&self, address: &Pubkey, _limit: usize) -> Result<Vec<SignatureInfo>> {
        Ok(self.signatures.lock().unwrap().get(&address.to_string()).cloned().unwrap_or_default())
    }

    async fn get_parsed_transaction(&self, signature: &str) -> Result<Option<ParsedTx>> {
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }

    async fn get_mint_decimals(&self, _mint: &Pubkey) -> Result<Option<u8>> {
        Ok(None)
    }
}

fn lamport_tx(wallet: &str, pre: u64, post: u64, pre_tb: Vec<TokenBalance>, post_tb: Vec<TokenBalance>, block_time: i64) -> ParsedTx {
    ParsedTx {
        meta: TxMeta { err: None, pre_balances: vec![pre], post_balances: vec![post], pre_token_balances: pre_tb, post_token_balances: post_tb },
        account_keys: vec![wallet.to_string()],
        block_time: Some(block_time),
    }
}

fn user(id: i64, wallet: &str) -> User {
    User { id, display_name: format!("user-{id}"), wallet_address: wallet.to_string(), stream_platform: None, is_live: true, last_active: None }
}

/// Scenarios 1+2: a buy followed by a sell for the same wallet on the same
/// day accumulate into one DailyPnL row, per spec.md's "when following
/// scenario 1" framing.
#[tokio::test(start_paused = true)]
async fn buy_then_sell_accumulates_daily_pnl() {
    let wallet = wallet_one();
    let mint = "M".to_string();
    let now = today();
    let bt = now.timestamp();

    let buy_tx = lamport_tx(
        &wallet,
        1_000_000_000,
        900_000_000,
        vec![],
        vec![TokenBalance { account_index: 3, mint: mint.clone(), owner: Some(wallet.clone()), ui_amount: Some(500.0) }],
        bt,
    );
    let sell_tx = lamport_tx(
        &wallet,
        900_000_000,
        1_100_000_000,
        vec![TokenBalance { account_index: 3, mint: mint.clone(), owner: Some(wallet.clone()), ui_amount: Some(500.0) }],
        vec![],
        bt + 1,
    );

    let signatures = vec![
        SignatureInfo { signature: "sell-sig".to_string(), block_time: Some(bt + 1) },
        SignatureInfo { signature: "buy-sig".to_string(), block_time: Some(bt) },
    ];
    let chain = Arc::new(FakeChainClient::with_signatures(
        &wallet,
        signatures,
        vec![("buy-sig".to_string(), buy_tx), ("sell-sig".to_string(), sell_tx)],
    ));

    let store: Arc<dyn Store> = Arc::new(FakeStore::with_users(vec![user(1, &wallet)]));
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
    let (events_tx, mut events_rx) = broadcast::channel(16);
    let pnl = Arc::new(PnlAggregator::new(store.clone(), clock.clone(), events_tx.clone()));
    let monitor = Arc::new(Monitor::new(chain, store.clone(), pnl, clock.clone(), events_tx));
    monitor.initialize().await.unwrap();

    let handle = tokio::spawn(monitor.clone().start());
    tokio::time::advance(solana_wallet_tracker::constants::MONITOR_CYCLE_PERIOD).await;
    // Give the spawned cycle a chance to run after the paused clock advances.
    tokio::task::yield_now().await;
    monitor.stop();
    handle.abort();

    let mut trade_events = vec![];
    while let Ok(ev) = events_rx.try_recv() {
        if let MonitorEvent::Trade { trade, .. } = ev {
            trade_events.push(trade);
        }
    }
    assert_eq!(trade_events.len(), 2, "expected both buy and sell trades to be published");

    let buy = trade_events.iter().find(|t| t.trade_type == TradeType::Buy).expect("buy trade");
    assert_eq!(buy.amount_a, Decimal::new(500, 0));
    assert_eq!(buy.amount_b, Decimal::new(1, 1));
    assert_eq!(buy.trade_pnl, Decimal::new(-1, 1));

    let sell = trade_events.iter().find(|t| t.trade_type == TradeType::Sell).expect("sell trade");
    assert_eq!(sell.amount_a, Decimal::new(500, 0));
    assert_eq!(sell.amount_b, Decimal::new(2, 1));
    assert_eq!(sell.trade_pnl, Decimal::new(2, 1));

    let day_start = clock.day_start(now);
    let pnl_row = store.get_daily_pnl(&wallet, day_start).await.unwrap().expect("daily pnl row");
    assert_eq!(pnl_row.total_trades, 2);
    assert_eq!(pnl_row.realized_pnl, Decimal::new(1, 1));
}

/// Scenario 3: a deposit (no opposing SOL move) is recorded as a trade but
/// never touches the DailyPnL ledger.
#[tokio::test(start_paused = true)]
async fn transfer_in_is_a_deposit_with_no_pnl_effect() {
    let wallet = wallet_one();
    let mint = "M".to_string();
    let now = today();
    let bt = now.timestamp();

    let deposit_tx = lamport_tx(
        &wallet,
        1_000_000_000,
        1_000_000_000,
        vec![],
        vec![TokenBalance { account_index: 3, mint: mint.clone(), owner: Some(wallet.clone()), ui_amount: Some(100.0) }],
        bt,
    );
    let signatures = vec![SignatureInfo { signature: "deposit-sig".to_string(), block_time: Some(bt) }];
    let chain = Arc::new(FakeChainClient::with_signatures(&wallet, signatures, vec![("deposit-sig".to_string(), deposit_tx)]));

    let store: Arc<dyn Store> = Arc::new(FakeStore::with_users(vec![user(1, &wallet)]));
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
    let (events_tx, _events_rx) = broadcast::channel(16);
    let pnl = Arc::new(PnlAggregator::new(store.clone(), clock.clone(), events_tx.clone()));
    let monitor = Arc::new(Monitor::new(chain, store.clone(), pnl, clock.clone(), events_tx));
    monitor.initialize().await.unwrap();

    let handle = tokio::spawn(monitor.clone().start());
    tokio::time::advance(solana_wallet_tracker::constants::MONITOR_CYCLE_PERIOD).await;
    tokio::task::yield_now().await;
    monitor.stop();
    handle.abort();

    let trade = store.trade_by_signature("deposit-sig").await.unwrap().expect("deposit trade persisted");
    assert_eq!(trade.trade_type, TradeType::Deposit);
    assert_eq!(trade.platform, "transfer");
    assert_eq!(trade.trade_pnl, Decimal::ZERO);

    let day_start = clock.day_start(now);
    assert!(store.get_daily_pnl(&wallet, day_start).await.unwrap().is_none(), "deposit must not create a daily pnl row");
}

/// Scenario 4: a fee-only transaction (dust-sized SOL move, no token
/// deltas) writes no trade and the signature is still cached.
#[tokio::test(start_paused = true)]
async fn fee_only_transaction_is_cache_skipped() {
    let wallet = wallet_one();
    let now = today();
    let bt = now.timestamp();

    let fee_tx = lamport_tx(&wallet, 1_000_000_000, 999_999_500, vec![], vec![], bt);
    let signatures = vec![SignatureInfo { signature: "fee-sig".to_string(), block_time: Some(bt) }];
    let chain = Arc::new(FakeChainClient::with_signatures(&wallet, signatures, vec![("fee-sig".to_string(), fee_tx)]));

    let store: Arc<dyn Store> = Arc::new(FakeStore::with_users(vec![user(1, &wallet)]));
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
    let (events_tx, _events_rx) = broadcast::channel(16);
    let pnl = Arc::new(PnlAggregator::new(store.clone(), clock.clone(), events_tx.clone()));
    let monitor = Arc::new(Monitor::new(chain, store.clone(), pnl, clock, events_tx));
    monitor.initialize().await.unwrap();

    let handle = tokio::spawn(monitor.clone().start());
    tokio::time::advance(solana_wallet_tracker::constants::MONITOR_CYCLE_PERIOD).await;
    tokio::task::yield_now().await;
    monitor.stop();
    handle.abort();

    assert!(store.trade_by_signature("fee-sig").await.unwrap().is_none());
}

/// Scenario 6: two subscribers, A on W1 only, B on W1 and W2. A TRADE_UPDATE
/// for W2 must reach B and not A.
#[tokio::test]
async fn subscriber_fan_out_respects_per_connection_subscriptions() {
    let w1 = wallet_one();
    let w2 = wallet_two();
    let now = today();

    let store: Arc<dyn Store> = Arc::new(FakeStore::with_users(vec![user(1, &w1), user(2, &w2)]));
    let chain = Arc::new(FakeChainClient::default());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
    let token_meta = Arc::new(TokenMeta::new(store.clone(), chain));
    let metrics = Arc::new(solana_wallet_tracker::monitoring::Metrics::new().unwrap());
    let hub = PushHub::new(store.clone(), token_meta, clock, metrics);

    let (id_a, mut rx_a, subscribed_a) = hub.register().await;
    let (id_b, mut rx_b, subscribed_b) = hub.register().await;
    subscribed_a.write().await.insert(w1.clone());
    subscribed_b.write().await.insert(w1.clone());
    subscribed_b.write().await.insert(w2.clone());

    let (events_tx, events_rx) = broadcast::channel(16);
    let hub_for_loop = hub.clone();
    let loop_handle = tokio::spawn(hub_for_loop.run_event_loop(events_rx));

    let trade = Trade {
        id: 1,
        signature: "sig-w2".to_string(),
        wallet_address: w2.clone(),
        user_id: Some(2),
        token_a: "M".to_string(),
        token_b: solana_wallet_tracker::constants::NATIVE_MINT.to_string(),
        trade_type: TradeType::Buy,
        amount_a: Decimal::new(1, 0),
        amount_b: Decimal::new(1, 1),
        trade_pnl: Decimal::new(-1, 1),
        platform: "unknown".to_string(),
        raw_data: None,
        timestamp: now,
    };
    events_tx.send(MonitorEvent::Trade { wallet: w2.clone(), trade }).unwrap();

    // Drain with a bounded number of recv attempts; the event loop task runs
    // concurrently with these awaits.
    let mut a_got_trade = false;
    let mut b_got_trade = false;
    for _ in 0..10 {
        if let Ok(frame) = tokio::time::timeout(std::time::Duration::from_millis(50), rx_a.recv()).await {
            if matches!(frame, Some(ServerFrame::TradeUpdate { ref wallet, .. }) if wallet == &w2) {
                a_got_trade = true;
            }
        }
        if let Ok(frame) = tokio::time::timeout(std::time::Duration::from_millis(50), rx_b.recv()).await {
            if matches!(frame, Some(ServerFrame::TradeUpdate { ref wallet, .. }) if wallet == &w2) {
                b_got_trade = true;
            }
        }
        if b_got_trade {
            break;
        }
    }

    assert!(!a_got_trade, "A is not subscribed to W2 and must not receive its trade update");
    assert!(b_got_trade, "B is subscribed to W2 and must receive its trade update");

    drop(events_tx);
    loop_handle.await.unwrap();
    hub.unregister(id_a).await;
    hub.unregister(id_b).await;
}
