use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

use super::traits::HoldingsFetcher;
use crate::errors::CoreError;
use crate::models::credentials::ExchangeCredentials;
use crate::models::holding::{FetchOutcome, RawHolding};
use crate::models::settings::MAX_BATCH_SIZE;
use crate::models::source::{HoldingSource, Venue};
use crate::net::parse::parse_decimal;
use crate::net::retry::RetryPolicy;
use crate::net::signing::{bybit_signature, canonical_query, timestamp_millis};
use crate::net::transport::{HttpRequest, HttpTransport};
use crate::providers::bybit::BybitEnvelope;
use crate::services::price_service::PricingCycle;

const PROVIDER: &str = "Bybit";
const BALANCE_PATH: &str = "/v5/asset/transfer/query-account-coins-balance";
const POSITION_PATH: &str = "/v5/position/info";
const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Bybit V5 balances across several account types.
///
/// The balance endpoint only answers for an explicit coin list of at most
/// ten coins, so the tracked list is split into chunks and every
/// (account type, chunk) pair is one signed request. A failed chunk is
/// reported and skipped; the remaining chunks still run.
///
/// After balances are in, each holding gets one best-effort cost-basis
/// lookup (`avgPrice` of the linear position). Any failure there leaves the
/// cost basis unknown. At most `max_in_flight` holdings are enriched at once.
pub struct BybitFetcher {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    recv_window_ms: u64,
    retry: RetryPolicy,
    account_types: Vec<String>,
    tracked_coins: Vec<String>,
    batch_size: usize,
    max_in_flight: usize,
}

impl BybitFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
        recv_window_ms: u64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            recv_window_ms,
            retry,
            account_types: vec!["UNIFIED".to_string()],
            tracked_coins: Vec::new(),
            batch_size: MAX_BATCH_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    pub fn with_account_types(mut self, account_types: Vec<String>) -> Self {
        self.account_types = account_types;
        self
    }

    /// Coins to query, uppercased and de-duplicated in first-seen order.
    pub fn with_tracked_coins(mut self, coins: &[String]) -> Self {
        let mut seen = HashSet::new();
        self.tracked_coins = coins
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty() && seen.insert(c.clone()))
            .collect();
        self
    }

    /// Clamped to 1..=10.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// Holdings priced and cost-looked-up concurrently; at least 1.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn tracked_coins(&self) -> &[String] {
        &self.tracked_coins
    }

    /// Coin chunks in request order.
    pub fn batches(&self) -> Vec<&[String]> {
        self.tracked_coins.chunks(self.batch_size).collect()
    }

    /// Signed GET with the V5 auth headers. The signed query string is also
    /// the one sent on the wire.
    pub fn signed_request(
        &self,
        credentials: &ExchangeCredentials,
        path: &str,
        params: &[(&str, String)],
        timestamp: &str,
    ) -> Result<HttpRequest, CoreError> {
        let query = canonical_query(params);
        let recv_window = self.recv_window_ms.to_string();
        let signature = bybit_signature(
            &credentials.api_secret,
            timestamp,
            &credentials.api_key,
            &recv_window,
            &query,
        )?;
        Ok(HttpRequest::get(format!("{}{path}?{query}", self.base_url))
            .header("X-BAPI-API-KEY", credentials.api_key.as_str())
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-TIMESTAMP", timestamp)
            .header("X-BAPI-RECV-WINDOW", recv_window))
    }

    async fn fetch_batch(
        &self,
        credentials: &ExchangeCredentials,
        account_type: &str,
        coins: &[String],
    ) -> Result<FetchOutcome, CoreError> {
        let params = [
            ("accountType", account_type.to_string()),
            ("coin", coins.join(",")),
        ];
        let params = &params;
        let label = format!("Bybit {account_type} balances");
        let result: BalanceResult = self
            .retry
            .execute(&label, || async move {
                let request =
                    self.signed_request(credentials, BALANCE_PATH, params, &timestamp_millis())?;
                let response = self
                    .transport
                    .get(request)
                    .await?
                    .error_for_status(PROVIDER)?;
                response
                    .json::<BybitEnvelope<BalanceResult>>(PROVIDER)?
                    .into_result()
            })
            .await?;

        let mut outcome = FetchOutcome::new();
        for entry in result.balance {
            let coin = entry.coin.clone();
            match holding_from(account_type, entry) {
                Ok(Some(holding)) => outcome.holdings.push(holding),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Skipping Bybit {account_type} {coin} balance: {e}");
                    outcome.errors.push(format!("Bybit {account_type} {coin}: {e}"));
                }
            }
        }
        Ok(outcome)
    }

    /// Cost basis of `holding`, or `None` when the venue cannot tell.
    ///
    /// Single attempt: a missing cost basis is not worth a retry budget.
    async fn cost_basis(
        &self,
        credentials: &ExchangeCredentials,
        holding: &RawHolding,
        pricing: &PricingCycle,
    ) -> Option<Decimal> {
        let service = pricing.service();
        if service.is_stablecoin(&holding.coin) {
            return Some(holding.amount);
        }

        let params = [
            ("category", "linear".to_string()),
            ("symbol", service.pair_for(&holding.coin, Venue::Bybit)),
        ];
        let lookup = async {
            let request =
                self.signed_request(credentials, POSITION_PATH, &params, &timestamp_millis())?;
            let response = self
                .transport
                .get(request)
                .await?
                .error_for_status(PROVIDER)?;
            let positions = response
                .json::<BybitEnvelope<PositionList>>(PROVIDER)?
                .into_result()?;
            match positions.list.first() {
                Some(p) => parse_decimal(PROVIDER, "avgPrice", &p.avg_price),
                None => Ok(Decimal::ZERO),
            }
        };

        match lookup.await {
            Ok(avg_price) if avg_price > Decimal::ZERO => avg_price.checked_mul(holding.amount),
            Ok(_) => None,
            Err(e) => {
                log::debug!("No Bybit cost basis for {}: {e}", holding.coin);
                None
            }
        }
    }
}

/// Non-zero holding for one balance row, `None` for an empty row.
fn holding_from(account_type: &str, entry: CoinBalance) -> Result<Option<RawHolding>, CoreError> {
    let amount = parse_decimal(PROVIDER, "walletBalance", &entry.wallet_balance)?;
    if amount <= Decimal::ZERO {
        return Ok(None);
    }
    let transferable = parse_decimal(PROVIDER, "transferBalance", &entry.transfer_balance)?;
    Ok(Some(
        RawHolding::new(HoldingSource::Bybit, account_type, entry.coin, amount)
            .with_transferable(transferable.clamp(Decimal::ZERO, amount)),
    ))
}

// ── Bybit API response types ────────────────────────────────────────

#[derive(Deserialize)]
struct BalanceResult {
    #[serde(default)]
    balance: Vec<CoinBalance>,
}

#[derive(Deserialize)]
struct CoinBalance {
    coin: String,
    #[serde(rename = "walletBalance", default)]
    wallet_balance: String,
    #[serde(rename = "transferBalance", default)]
    transfer_balance: String,
}

#[derive(Deserialize)]
struct PositionList {
    #[serde(default)]
    list: Vec<Position>,
}

#[derive(Deserialize)]
struct Position {
    #[serde(rename = "avgPrice", default)]
    avg_price: String,
}

#[async_trait]
impl HoldingsFetcher for BybitFetcher {
    fn source(&self) -> HoldingSource {
        HoldingSource::Bybit
    }

    async fn fetch_holdings(
        &self,
        credentials: &ExchangeCredentials,
        pricing: &PricingCycle,
    ) -> FetchOutcome {
        let mut outcome = FetchOutcome::new();
        let batches = self.batches();

        for account_type in &self.account_types {
            for (index, coins) in batches.iter().enumerate() {
                match self.fetch_batch(credentials, account_type, coins).await {
                    Ok(batch) => outcome.merge(batch),
                    Err(e) => {
                        log::warn!(
                            "Bybit {account_type} batch {}/{} failed: {e}",
                            index + 1,
                            batches.len()
                        );
                        outcome.errors.push(format!(
                            "Bybit {account_type} batch {}: {e}",
                            index + 1
                        ));
                    }
                }
            }
        }

        outcome.holdings = stream::iter(std::mem::take(&mut outcome.holdings))
            .map(|holding| async move {
                let price = pricing.price_for(&holding.coin, &[Venue::Bybit]).await;
                let cost = self.cost_basis(credentials, &holding, pricing).await;
                holding.with_price(price.ok()).with_original_value(cost)
            })
            .buffered(self.max_in_flight)
            .collect()
            .await;

        log::info!(
            "Bybit: {} non-zero balances, {} errors",
            outcome.holdings.len(),
            outcome.errors.len()
        );
        outcome
    }
}
