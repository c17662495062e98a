use async_trait::async_trait;

use crate::models::credentials::ExchangeCredentials;
use crate::models::holding::FetchOutcome;
use crate::models::source::HoldingSource;
use crate::services::price_service::PricingCycle;

/// Turns stored API credentials into priced raw holdings for one exchange.
///
/// Never fails as a whole: every exchange or network failure becomes an
/// entry in `FetchOutcome::errors`, and whatever was fetched before the
/// failure is still returned. Zero balances are never reported.
#[async_trait]
pub trait HoldingsFetcher: Send + Sync {
    /// Source this fetcher reports holdings under.
    fn source(&self) -> HoldingSource;

    async fn fetch_holdings(
        &self,
        credentials: &ExchangeCredentials,
        pricing: &PricingCycle,
    ) -> FetchOutcome;
}
