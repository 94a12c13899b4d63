use super::types::{ParsedTx, SignatureInfo, TokenAccount, TokenBalance, TxMeta};
use crate::errors::{BotError, Result};
use crate::middleware::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_transaction_status::{
    option_serializer::OptionSerializer, EncodedTransaction, UiMessage, UiTransactionEncoding,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::instrument;

/// Everything the Monitor needs from the chain, isolated behind a trait so
/// tests can substitute a fake without touching the network.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64>;
    async fn get_parsed_token_accounts(&self, owner: &Pubkey) -> Result<Vec<TokenAccount>>;
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>>;
    async fn get_parsed_transaction(&self, signature: &str) -> Result<Option<ParsedTx>>;

    /// Best-effort on-chain decimals lookup for a mint; SPL token metadata
    /// beyond decimals lives in a separate indexing service this crate does
    /// not integrate (see spec's out-of-scope token-metadata lookup service).
    async fn get_mint_decimals(&self, mint: &Pubkey) -> Result<Option<u8>>;
}

pub struct RpcChainClient {
    rpc: RpcClient,
    semaphore: Arc<Semaphore>,
    breaker: CircuitBreaker,
}

impl RpcChainClient {
    pub fn new(rpc_url: String, max_concurrent_requests: usize) -> Self {
        let rpc = RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed());
        let breaker = CircuitBreaker::new(
            "solana-rpc".to_string(),
            CircuitBreakerConfig {
                failure_threshold: 5,
                timeout: Duration::from_secs(30),
                success_threshold: 2,
            },
        );
        Self {
            rpc,
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests)),
            breaker,
        }
    }

    async fn guarded<F, T>(&self, op: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, solana_client::client_error::ClientError>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| BotError::internal(format!("rpc semaphore closed: {e}")))?;
        self.breaker.execute(op).await.map_err(|e| match e {
            CircuitBreakerError::CircuitOpen => BotError::rpc("circuit breaker open"),
            CircuitBreakerError::OperationFailed(err) => BotError::from(err),
        })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    #[instrument(skip(self))]
    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        self.guarded(self.rpc.get_balance(address)).await
    }

    #[instrument(skip(self))]
    async fn get_parsed_token_accounts(&self, owner: &Pubkey) -> Result<Vec<TokenAccount>> {
        let token_program = Pubkey::from_str("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA")
            .expect("token program id is a valid pubkey literal");
        let accounts = self
            .guarded(self.rpc.get_token_accounts_by_owner(
                owner,
                solana_client::rpc_request::TokenAccountsFilter::ProgramId(token_program),
            ))
            .await?;

        let mut out = Vec::with_capacity(accounts.len());
        for keyed in accounts {
            let parsed: serde_json::Value = match &keyed.account.data {
                solana_account_decoder::UiAccountData::Json(parsed) => {
                    serde_json::to_value(parsed).unwrap_or(serde_json::Value::Null)
                }
                _ => continue,
            };
            let info = &parsed["parsed"]["info"];
            let mint = info["mint"].as_str().unwrap_or_default().to_string();
            let ui_amount = info["tokenAmount"]["uiAmount"].as_f64();
            if !mint.is_empty() {
                out.push(TokenAccount { mint, ui_amount });
            }
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        let config = GetConfirmedSignaturesForAddress2Config {
            limit: Some(limit),
            ..Default::default()
        };
        let statuses = self
            .guarded(
                self.rpc
                    .get_signatures_for_address_with_config(address, config),
            )
            .await?;

        Ok(statuses
            .into_iter()
            .map(|s| SignatureInfo {
                signature: s.signature,
                block_time: s.block_time,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_parsed_transaction(&self, signature: &str) -> Result<Option<ParsedTx>> {
        let sig = solana_sdk::signature::Signature::from_str(signature)
            .map_err(|e| BotError::parse(format!("invalid signature: {e}")))?;
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        let tx = match self
            .guarded(self.rpc.get_transaction_with_config(&sig, config))
            .await
        {
            Ok(tx) => tx,
            Err(BotError::Rpc(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let meta = tx
            .transaction
            .meta
            .ok_or_else(|| BotError::parse("transaction has no meta"))?;

        let account_keys = match &tx.transaction.transaction {
            EncodedTransaction::Json(ui_tx) => match &ui_tx.message {
                UiMessage::Parsed(m) => m.account_keys.iter().map(|a| a.pubkey.clone()).collect(),
                UiMessage::Raw(m) => m.account_keys.clone(),
            },
            _ => return Err(BotError::parse("unsupported transaction encoding")),
        };

        let to_balances = |opt: OptionSerializer<Vec<solana_transaction_status::UiTransactionTokenBalance>>| -> Vec<TokenBalance> {
            match opt {
                OptionSerializer::Some(v) => v
                    .into_iter()
                    .map(|b| TokenBalance {
                        account_index: b.account_index as u32,
                        mint: b.mint,
                        owner: match b.owner {
                            OptionSerializer::Some(o) => Some(o),
                            _ => None,
                        },
                        ui_amount: b.ui_token_amount.ui_amount,
                    })
                    .collect(),
                _ => Vec::new(),
            }
        };

        let err = meta.err.as_ref().map(|e| {
            serde_json::to_value(e).unwrap_or(serde_json::Value::String(e.to_string()))
        });

        Ok(Some(ParsedTx {
            meta: TxMeta {
                err,
                pre_balances: meta.pre_balances,
                post_balances: meta.post_balances,
                pre_token_balances: to_balances(meta.pre_token_balances),
                post_token_balances: to_balances(meta.post_token_balances),
            },
            account_keys,
            block_time: tx.block_time,
        }))
    }

    #[instrument(skip(self))]
    async fn get_mint_decimals(&self, mint: &Pubkey) -> Result<Option<u8>> {
        match self.guarded(self.rpc.get_account(mint)).await {
            Ok(account) => match solana_account_decoder::parse_token::parse_token(&account.data, None) {
                Ok(solana_account_decoder::parse_token::TokenAccountType::Mint(ui_mint)) => Ok(Some(ui_mint.decimals)),
                _ => Ok(None),
            },
            Err(BotError::Rpc(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
