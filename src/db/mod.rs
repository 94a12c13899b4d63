pub mod models;

use crate::errors::{BotError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::{DailyPnl, DailyPnlUpdate, NewDailyPnl, NewTokenMeta, NewTrade, Trade, TokenMetaRow, User};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::instrument;

/// Persistence boundary for users, trades, daily-PnL rows, and token
/// metadata. All mutations are atomic at row level; the spec requires no
/// multi-row transactions, so every method below is a single statement.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<()>;

    async fn list_live_users(&self) -> Result<Vec<User>>;
    /// Every registered user, not just currently-live ones, ordered by
    /// `last_active` descending — what the Push Hub sends on connect.
    async fn list_all_users(&self) -> Result<Vec<User>>;
    async fn user_by_wallet(&self, wallet: &str) -> Result<Option<User>>;

    /// Insert by signature; on conflict, overwrite all columns and return
    /// the stable row (its id never changes across upserts).
    async fn upsert_trade(&self, trade: NewTrade) -> Result<Trade>;
    async fn trade_by_signature(&self, signature: &str) -> Result<Option<Trade>>;
    async fn trade_by_id(&self, id: i64) -> Result<Option<Trade>>;
    async fn latest_trade(&self, wallet: &str) -> Result<Option<Trade>>;
    async fn latest_signatures_for_wallet(
        &self,
        wallet: &str,
        limit: i64,
    ) -> Result<Vec<(String, DateTime<Utc>)>>;

    async fn get_daily_pnl(&self, wallet: &str, day_start: DateTime<Utc>) -> Result<Option<DailyPnl>>;
    async fn insert_daily_pnl(&self, row: NewDailyPnl) -> Result<DailyPnl>;
    async fn update_daily_pnl(
        &self,
        wallet: &str,
        day_start: DateTime<Utc>,
        fields: DailyPnlUpdate,
    ) -> Result<DailyPnl>;
    /// Most recent prior row for the wallet, if any (used to seed a new day).
    async fn last_daily_pnl(&self, wallet: &str) -> Result<Option<DailyPnl>>;

    async fn token_by_address(&self, address: &str) -> Result<Option<TokenMetaRow>>;
    /// Every known token row, for TokenMeta's startup cache preload.
    async fn list_all_tokens(&self) -> Result<Vec<TokenMetaRow>>;
    async fn upsert_token(&self, token: NewTokenMeta) -> Result<TokenMetaRow>;
    async fn set_token_price(&self, address: &str, price: rust_decimal::Decimal, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| BotError::persistence(format!("failed to connect to database: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| BotError::persistence(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_live_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"SELECT id, display_name, wallet_address, stream_platform, is_live, last_active
               FROM users WHERE is_live = TRUE"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn list_all_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"SELECT id, display_name, wallet_address, stream_platform, is_live, last_active
               FROM users ORDER BY last_active DESC NULLS LAST"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn user_by_wallet(&self, wallet: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"SELECT id, display_name, wallet_address, stream_platform, is_live, last_active
               FROM users WHERE wallet_address = $1"#,
        )
        .bind(wallet)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, trade))]
    async fn upsert_trade(&self, trade: NewTrade) -> Result<Trade> {
        let row = sqlx::query_as::<_, Trade>(
            r#"INSERT INTO trades
                 (signature, wallet_address, user_id, token_a, token_b, type,
                  amount_a, amount_b, trade_pnl, platform, raw_data, timestamp, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
               ON CONFLICT (signature) DO UPDATE SET
                 wallet_address = EXCLUDED.wallet_address,
                 user_id = EXCLUDED.user_id,
                 token_a = EXCLUDED.token_a,
                 token_b = EXCLUDED.token_b,
                 type = EXCLUDED.type,
                 amount_a = EXCLUDED.amount_a,
                 amount_b = EXCLUDED.amount_b,
                 trade_pnl = EXCLUDED.trade_pnl,
                 platform = EXCLUDED.platform,
                 raw_data = EXCLUDED.raw_data,
                 timestamp = EXCLUDED.timestamp,
                 updated_at = now()
               RETURNING id, signature, wallet_address, user_id, token_a, token_b, type,
                         amount_a, amount_b, trade_pnl, platform, raw_data, timestamp"#,
        )
        .bind(&trade.signature)
        .bind(&trade.wallet_address)
        .bind(trade.user_id)
        .bind(&trade.token_a)
        .bind(&trade.token_b)
        .bind(trade.trade_type)
        .bind(trade.amount_a)
        .bind(trade.amount_b)
        .bind(trade.trade_pnl)
        .bind(&trade.platform)
        .bind(&trade.raw_data)
        .bind(trade.timestamp)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn trade_by_signature(&self, signature: &str) -> Result<Option<Trade>> {
        let row = sqlx::query_as::<_, Trade>(
            r#"SELECT id, signature, wallet_address, user_id, token_a, token_b, type,
                      amount_a, amount_b, trade_pnl, platform, raw_data, timestamp
               FROM trades WHERE signature = $1"#,
        )
        .bind(signature)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn trade_by_id(&self, id: i64) -> Result<Option<Trade>> {
        let row = sqlx::query_as::<_, Trade>(
            r#"SELECT id, signature, wallet_address, user_id, token_a, token_b, type,
                      amount_a, amount_b, trade_pnl, platform, raw_data, timestamp
               FROM trades WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn latest_trade(&self, wallet: &str) -> Result<Option<Trade>> {
        let row = sqlx::query_as::<_, Trade>(
            r#"SELECT id, signature, wallet_address, user_id, token_a, token_b, type,
                      amount_a, amount_b, trade_pnl, platform, raw_data, timestamp
               FROM trades WHERE wallet_address = $1
               ORDER BY timestamp DESC LIMIT 1"#,
        )
        .bind(wallet)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn latest_signatures_for_wallet(
        &self,
        wallet: &str,
        limit: i64,
    ) -> Result<Vec<(String, DateTime<Utc>)>> {
        let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
            r#"SELECT signature, timestamp FROM trades
               WHERE wallet_address = $1
               ORDER BY timestamp DESC LIMIT $2"#,
        )
        .bind(wallet)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn get_daily_pnl(&self, wallet: &str, day_start: DateTime<Utc>) -> Result<Option<DailyPnl>> {
        let row = sqlx::query_as::<_, DailyPnl>(
            r#"SELECT id, wallet_address, date, start_balance, end_balance, realized_pnl,
                      total_trades, last_trade_id, created_at, updated_at
               FROM pnl_records WHERE wallet_address = $1 AND date = $2"#,
        )
        .bind(wallet)
        .bind(day_start)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, row))]
    async fn insert_daily_pnl(&self, row: NewDailyPnl) -> Result<DailyPnl> {
        let inserted = sqlx::query_as::<_, DailyPnl>(
            r#"INSERT INTO pnl_records
                 (wallet_address, user_id, date, start_balance, end_balance, realized_pnl, total_trades)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (wallet_address, date) DO NOTHING
               RETURNING id, wallet_address, date, start_balance, end_balance, realized_pnl,
                         total_trades, last_trade_id, created_at, updated_at"#,
        )
        .bind(&row.wallet_address)
        .bind(row.user_id)
        .bind(row.date)
        .bind(row.start_balance)
        .bind(row.end_balance)
        .bind(row.realized_pnl)
        .bind(row.total_trades)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(r) => Ok(r),
            // Lost the race against a concurrent first-touch; the row now exists.
            None => self
                .get_daily_pnl(&row.wallet_address, row.date)
                .await?
                .ok_or_else(|| BotError::internal("daily pnl row missing after insert conflict")),
        }
    }

    #[instrument(skip(self, fields))]
    async fn update_daily_pnl(
        &self,
        wallet: &str,
        day_start: DateTime<Utc>,
        fields: DailyPnlUpdate,
    ) -> Result<DailyPnl> {
        let row = sqlx::query_as::<_, DailyPnl>(
            r#"UPDATE pnl_records SET
                 end_balance = $3,
                 realized_pnl = $4,
                 total_trades = $5,
                 last_trade_id = $6,
                 updated_at = now()
               WHERE wallet_address = $1 AND date = $2
               RETURNING id, wallet_address, date, start_balance, end_balance, realized_pnl,
                         total_trades, last_trade_id, created_at, updated_at"#,
        )
        .bind(wallet)
        .bind(day_start)
        .bind(fields.end_balance)
        .bind(fields.realized_pnl)
        .bind(fields.total_trades)
        .bind(fields.last_trade_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn last_daily_pnl(&self, wallet: &str) -> Result<Option<DailyPnl>> {
        let row = sqlx::query_as::<_, DailyPnl>(
            r#"SELECT id, wallet_address, date, start_balance, end_balance, realized_pnl,
                      total_trades, last_trade_id, created_at, updated_at
               FROM pnl_records WHERE wallet_address = $1
               ORDER BY date DESC LIMIT 1"#,
        )
        .bind(wallet)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn token_by_address(&self, address: &str) -> Result<Option<TokenMetaRow>> {
        let row = sqlx::query_as::<_, TokenMetaRow>(
            r#"SELECT id, address, symbol, name, decimals, verified, last_price, last_updated
               FROM tokens WHERE address = $1"#,
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn list_all_tokens(&self) -> Result<Vec<TokenMetaRow>> {
        let rows = sqlx::query_as::<_, TokenMetaRow>(
            r#"SELECT id, address, symbol, name, decimals, verified, last_price, last_updated
               FROM tokens"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self, token))]
    async fn upsert_token(&self, token: NewTokenMeta) -> Result<TokenMetaRow> {
        let row = sqlx::query_as::<_, TokenMetaRow>(
            r#"INSERT INTO tokens (address, symbol, name, decimals, verified)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (address) DO UPDATE SET
                 symbol = EXCLUDED.symbol,
                 name = EXCLUDED.name,
                 decimals = EXCLUDED.decimals,
                 verified = EXCLUDED.verified,
                 updated_at = now()
               RETURNING id, address, symbol, name, decimals, verified, last_price, last_updated"#,
        )
        .bind(&token.address)
        .bind(&token.symbol)
        .bind(&token.name)
        .bind(token.decimals)
        .bind(token.verified)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn set_token_price(&self, address: &str, price: rust_decimal::Decimal, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"UPDATE tokens SET last_price = $2, last_updated = $3, updated_at = now() WHERE address = $1"#,
        )
        .bind(address)
        .bind(price)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
