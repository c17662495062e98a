use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

use super::traits::PriceProvider;
use crate::errors::CoreError;
use crate::models::source::Venue;
use crate::net::parse::parse_decimal;
use crate::net::transport::{HttpRequest, HttpTransport};

const PROVIDER: &str = "Binance";

/// Binance public ticker: `GET /api/v3/ticker/price?symbol=BTCUSDT`.
///
/// - **Free**: no API key, no signature.
/// - **Errors**: unknown pairs answer HTTP 400 with `{"code":-1121,"msg":"Invalid symbol."}`.
pub struct BinancePriceProvider {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl BinancePriceProvider {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn ticker_url(&self, pair: &str) -> String {
        format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.base_url,
            urlencoding::encode(pair)
        )
    }
}

// ── Binance API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct TickerPrice {
    price: String,
}

#[async_trait]
impl PriceProvider for BinancePriceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn venue(&self) -> Venue {
        Venue::Binance
    }

    async fn fetch_price(&self, pair: &str) -> Result<Decimal, CoreError> {
        let response = self
            .transport
            .get(HttpRequest::get(self.ticker_url(pair)))
            .await?
            .error_for_status(PROVIDER)?;
        let ticker: TickerPrice = response.json(PROVIDER)?;
        parse_decimal(PROVIDER, "price", &ticker.price)
    }
}
