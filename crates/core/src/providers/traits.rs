use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::CoreError;
use crate::models::source::Venue;

/// Trait abstraction for venue ticker price sources.
///
/// Each venue implements this once; the price service owns symbol policy,
/// retry and caching, so implementations make exactly one request per call.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Venue this provider quotes.
    fn venue(&self) -> Venue;

    /// Last traded price of a listed pair such as `BTCUSDT`.
    ///
    /// The raw venue value is returned; positivity is checked by the caller.
    async fn fetch_price(&self, pair: &str) -> Result<Decimal, CoreError>;
}
