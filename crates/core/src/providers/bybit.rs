use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

use super::traits::PriceProvider;
use crate::errors::CoreError;
use crate::models::source::Venue;
use crate::net::parse::parse_decimal;
use crate::net::transport::{HttpRequest, HttpTransport};

const PROVIDER: &str = "Bybit";

/// `retCode` Bybit returns when the caller exceeds its request quota.
pub const RATE_LIMIT_RET_CODE: i64 = 10006;

/// Envelope every Bybit V5 endpoint wraps its payload in.
///
/// HTTP 200 does not mean success: `retCode != 0` carries the real error.
#[derive(Debug, Deserialize)]
pub struct BybitEnvelope<T> {
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    #[serde(rename = "retMsg", default)]
    pub ret_msg: String,
    pub result: Option<T>,
}

impl<T> BybitEnvelope<T> {
    /// Unwrap the payload, mapping non-zero `retCode` to a `CoreError`.
    pub fn into_result(self) -> Result<T, CoreError> {
        match self.ret_code {
            0 => self.result.ok_or_else(|| CoreError::Api {
                provider: PROVIDER.into(),
                message: "Response has no result".into(),
            }),
            RATE_LIMIT_RET_CODE => Err(CoreError::RateLimited {
                provider: PROVIDER.into(),
            }),
            code => Err(CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("retCode {code}: {}", self.ret_msg),
            }),
        }
    }
}

/// Bybit public spot ticker: `GET /v5/market/tickers?category=spot&symbol=BTCUSDT`.
pub struct BybitPriceProvider {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl BybitPriceProvider {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn ticker_url(&self, pair: &str) -> String {
        format!(
            "{}/v5/market/tickers?category=spot&symbol={}",
            self.base_url,
            urlencoding::encode(pair)
        )
    }
}

// ── Bybit API response types ────────────────────────────────────────

#[derive(Deserialize)]
struct TickerList {
    #[serde(default)]
    list: Vec<Ticker>,
}

#[derive(Deserialize)]
struct Ticker {
    #[serde(rename = "lastPrice")]
    last_price: String,
}

#[async_trait]
impl PriceProvider for BybitPriceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn venue(&self) -> Venue {
        Venue::Bybit
    }

    async fn fetch_price(&self, pair: &str) -> Result<Decimal, CoreError> {
        let response = self
            .transport
            .get(HttpRequest::get(self.ticker_url(pair)))
            .await?
            .error_for_status(PROVIDER)?;
        let envelope: BybitEnvelope<TickerList> = response.json(PROVIDER)?;
        let tickers = envelope.into_result()?;
        let ticker = tickers
            .list
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::PriceNotAvailable {
                symbol: pair.to_string(),
                venue: PROVIDER.into(),
            })?;
        parse_decimal(PROVIDER, "lastPrice", &ticker.last_price)
    }
}
