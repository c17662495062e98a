use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

use super::traits::HoldingsFetcher;
use crate::errors::CoreError;
use crate::models::credentials::ExchangeCredentials;
use crate::models::holding::{FetchOutcome, RawHolding};
use crate::models::source::{HoldingSource, Venue};
use crate::net::parse::parse_decimal;
use crate::net::retry::RetryPolicy;
use crate::net::signing::{binance_signature, canonical_query, timestamp_millis};
use crate::net::transport::{HttpRequest, HttpTransport};
use crate::services::price_service::PricingCycle;

const PROVIDER: &str = "Binance";
const ACCOUNT_TYPE: &str = "Spot";
const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Binance spot balances from one signed `GET /api/v3/account` call.
///
/// - amount = free + locked, transferable = free
/// - cost basis is never available
/// - a malformed balance row is reported and skipped
pub struct BinanceFetcher {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    recv_window_ms: u64,
    retry: RetryPolicy,
    max_in_flight: usize,
}

impl BinanceFetcher {
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
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Price lookups in flight at once; at least 1.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Signed account request. Re-built per attempt so the timestamp stays
    /// inside the receive window across retries.
    pub fn account_request(
        &self,
        credentials: &ExchangeCredentials,
        timestamp: &str,
    ) -> Result<HttpRequest, CoreError> {
        let query = canonical_query(&[
            ("recvWindow", self.recv_window_ms.to_string()),
            ("timestamp", timestamp.to_string()),
        ]);
        let signature = binance_signature(&credentials.api_secret, &query)?;
        Ok(HttpRequest::get(format!(
            "{}/api/v3/account?{query}&signature={signature}",
            self.base_url
        ))
        .header("X-MBX-APIKEY", credentials.api_key.as_str()))
    }

    async fn fetch_account(
        &self,
        credentials: &ExchangeCredentials,
    ) -> Result<AccountInfo, CoreError> {
        self.retry
            .execute("Binance account", || async move {
                let request = self.account_request(credentials, &timestamp_millis())?;
                let response = self
                    .transport
                    .get(request)
                    .await?
                    .error_for_status(PROVIDER)?;
                response.json::<AccountInfo>(PROVIDER)
            })
            .await
    }
}

/// Non-zero holding for one balance row, `None` for an empty row.
fn holding_from(balance: Balance) -> Result<Option<RawHolding>, CoreError> {
    let free = parse_decimal(PROVIDER, "free", &balance.free)?;
    let locked = parse_decimal(PROVIDER, "locked", &balance.locked)?;
    let amount = free.checked_add(locked).ok_or_else(|| CoreError::Api {
        provider: PROVIDER.to_string(),
        message: format!("{} balance {free} + {locked} is out of range", balance.asset),
    })?;
    if amount <= Decimal::ZERO {
        return Ok(None);
    }
    Ok(Some(
        RawHolding::new(HoldingSource::Binance, ACCOUNT_TYPE, balance.asset, amount)
            .with_transferable(free.max(Decimal::ZERO)),
    ))
}

// ── Binance API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct AccountInfo {
    #[serde(default)]
    balances: Vec<Balance>,
}

#[derive(Deserialize)]
struct Balance {
    asset: String,
    free: String,
    locked: String,
}

#[async_trait]
impl HoldingsFetcher for BinanceFetcher {
    fn source(&self) -> HoldingSource {
        HoldingSource::Binance
    }

    async fn fetch_holdings(
        &self,
        credentials: &ExchangeCredentials,
        pricing: &PricingCycle,
    ) -> FetchOutcome {
        let account = match self.fetch_account(credentials).await {
            Ok(account) => account,
            Err(e) => {
                log::warn!("Binance balance fetch failed: {e}");
                return FetchOutcome::failed(format!("Binance: {e}"));
            }
        };

        let mut errors = Vec::new();
        let mut holdings = Vec::new();
        for balance in account.balances {
            let asset = balance.asset.clone();
            match holding_from(balance) {
                Ok(Some(holding)) => holdings.push(holding),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Skipping Binance {asset} balance: {e}");
                    errors.push(format!("Binance {asset}: {e}"));
                }
            }
        }

        let holdings: Vec<RawHolding> = stream::iter(holdings)
            .map(|holding| async move {
                let price = pricing.price_for(&holding.coin, &[Venue::Binance]).await;
                holding.with_price(price.ok())
            })
            .buffered(self.max_in_flight)
            .collect()
            .await;

        log::info!("Binance: {} non-zero balances", holdings.len());
        FetchOutcome { holdings, errors }
    }
}
