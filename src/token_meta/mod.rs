use crate::cache::{CacheStrategy, TtlCache};
use crate::chain::ChainClient;
use crate::constants::NATIVE_MINT;
use crate::db::models::{NewTokenMeta, TokenMetaRow};
use crate::db::Store;
use crate::errors::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

const CACHE_CAPACITY: usize = 5_000;
const CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetaView {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: Option<i32>,
    pub verified: bool,
    pub last_price: Option<Decimal>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<TokenMetaRow> for TokenMetaView {
    fn from(row: TokenMetaRow) -> Self {
        Self {
            address: row.address,
            symbol: row.symbol,
            name: row.name,
            decimals: row.decimals,
            verified: row.verified,
            last_price: row.last_price,
            last_updated: row.last_updated,
        }
    }
}

fn native_view() -> TokenMetaView {
    TokenMetaView {
        address: NATIVE_MINT.to_string(),
        symbol: "SOL".to_string(),
        name: "SOL".to_string(),
        decimals: Some(9),
        verified: true,
        last_price: None,
        last_updated: None,
    }
}

/// Synthesizes a short symbol for a mint with no known metadata, per the
/// first-3/last-3-character rule.
fn fallback_symbol(mint: &str) -> String {
    if mint.chars().count() <= 6 {
        return mint.to_string();
    }
    let first: String = mint.chars().take(3).collect();
    let last: String = mint.chars().rev().take(3).collect::<String>().chars().rev().collect();
    format!("{first}...{last}")
}

/// Mint-address → metadata resolver: cache in front of the Store, the Store
/// in front of the chain, chain only contributing decimals (see
/// `ChainClient::get_mint_decimals`).
pub struct TokenMeta {
    store: Arc<dyn Store>,
    chain: Arc<dyn ChainClient>,
    cache: Arc<TtlCache<String, TokenMetaView>>,
}

impl TokenMeta {
    pub fn new(store: Arc<dyn Store>, chain: Arc<dyn ChainClient>) -> Self {
        Self {
            store,
            chain,
            cache: TtlCache::new(CACHE_CAPACITY, CACHE_TTL).with_cleanup_interval(Duration::from_secs(60)),
        }
    }

    /// Loads every known token row into the cache up front, so the first
    /// cycle's lookups hit the cache instead of the Store.
    #[instrument(skip(self))]
    pub async fn preload(&self) -> Result<()> {
        let rows = self.store.list_all_tokens().await?;
        for row in rows {
            let view: TokenMetaView = row.into();
            let _ = self.cache.set(view.address.clone(), view).await;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, mint: &str) -> Result<TokenMetaView> {
        if mint == NATIVE_MINT {
            return Ok(native_view());
        }

        if let Some(view) = self.cache.get(&mint.to_string()).await {
            return Ok(view);
        }

        if let Some(row) = self.store.token_by_address(mint).await? {
            let view: TokenMetaView = row.into();
            let _ = self.cache.set(mint.to_string(), view.clone()).await;
            return Ok(view);
        }

        let decimals = match solana_sdk::pubkey::Pubkey::from_str(mint) {
            Ok(pubkey) => self.chain.get_mint_decimals(&pubkey).await.unwrap_or(None),
            Err(_) => None,
        };
        let symbol = fallback_symbol(mint);

        let row = self
            .store
            .upsert_token(NewTokenMeta {
                address: mint.to_string(),
                symbol: symbol.clone(),
                name: symbol,
                decimals: decimals.map(i32::from),
                verified: false,
            })
            .await?;

        let view: TokenMetaView = row.into();
        let _ = self.cache.set(mint.to_string(), view.clone()).await;
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn set_price(&self, mint: &str, price_usd: Decimal, at: DateTime<Utc>) -> Result<()> {
        self.store.set_token_price(mint, price_usd, at).await?;
        if let Some(mut view) = self.cache.get(&mint.to_string()).await {
            view.last_price = Some(price_usd);
            view.last_updated = Some(at);
            let _ = self.cache.set(mint.to_string(), view).await;
        }
        Ok(())
    }
}
