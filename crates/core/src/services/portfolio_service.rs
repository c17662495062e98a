use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::exchanges::traits::HoldingsFetcher;
use crate::models::credentials::UserCredentials;
use crate::models::holding::{ConsolidatedHolding, RawHolding};
use crate::models::metrics::PortfolioMetrics;
use crate::models::source::HoldingSource;
use crate::services::aggregation_service::AggregationService;
use crate::services::manual_service::ManualHoldingsService;
use crate::services::metrics_service::MetricsService;
use crate::services::price_service::{PriceService, PricingCycle};
use crate::storage::traits::{CredentialStore, ManualHoldingStore};

/// Everything one fetch cycle produced for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleResult {
    pub user_id: String,
    pub consolidated: BTreeMap<String, ConsolidatedHolding>,
    pub metrics: PortfolioMetrics,
    /// Sources configured at fetch time, whether or not they returned data
    pub active_sources: BTreeSet<HoldingSource>,
    pub errors: Vec<String>,
    pub has_credentials: bool,
    /// False when a credential or manual-holdings lookup failed, so
    /// `active_sources` may not match what the user has configured
    pub sources_known: bool,
}

impl CycleResult {
    /// Nothing to value: no holdings came back from any source.
    pub fn is_empty(&self) -> bool {
        self.consolidated.is_empty()
    }
}

/// Runs one fetch cycle: credentials → fetchers and manual source in
/// parallel → validation → aggregation → metrics.
///
/// Never fails: every expected problem (missing keys, network, pricing
/// gaps, store errors) ends up in `CycleResult::errors`.
pub struct PortfolioService {
    price_service: Arc<PriceService>,
    fetchers: Vec<Arc<dyn HoldingsFetcher>>,
    manual: ManualHoldingsService,
    aggregation: AggregationService,
    metrics: MetricsService,
}

impl PortfolioService {
    pub fn new(
        price_service: Arc<PriceService>,
        fetchers: Vec<Arc<dyn HoldingsFetcher>>,
        manual: ManualHoldingsService,
        aggregation: AggregationService,
    ) -> Self {
        Self {
            price_service,
            fetchers,
            manual,
            aggregation,
            metrics: MetricsService::new(),
        }
    }

    pub fn aggregation(&self) -> &AggregationService {
        &self.aggregation
    }

    pub async fn run_cycle(
        &self,
        user_id: &str,
        credential_store: &dyn CredentialStore,
        manual_store: &dyn ManualHoldingStore,
    ) -> CycleResult {
        let mut errors = Vec::new();
        let mut sources_known = true;

        let credentials = match credential_store.get_credentials(user_id).await {
            Ok(credentials) => credentials,
            Err(e) => {
                log::error!("Credential lookup failed for {user_id}: {e}");
                errors.push(format!("Could not load API keys: {e}"));
                sources_known = false;
                UserCredentials::default()
            }
        };

        let pricing = PricingCycle::new(self.price_service.clone());

        let exchange_fetches = self.fetchers.iter().filter_map(|fetcher| {
            let venue = fetcher.source().venue()?;
            let creds = credentials.for_venue(venue)?;
            Some(fetcher.fetch_holdings(creds, &pricing))
        });
        let manual_fetch = self
            .manual
            .list_manual_holdings(manual_store, user_id, &pricing);

        let (exchange_outcomes, manual_result) =
            futures::join!(join_all(exchange_fetches), manual_fetch);

        let mut active_sources = credentials.active_sources();
        let mut raw: Vec<RawHolding> = Vec::new();

        for outcome in exchange_outcomes {
            raw.extend(outcome.holdings);
            errors.extend(outcome.errors);
        }

        match manual_result {
            Ok(holdings) => {
                if !holdings.is_empty() {
                    active_sources.insert(HoldingSource::Manual);
                }
                raw.extend(holdings);
            }
            Err(e) => {
                log::error!("Manual holdings lookup failed for {user_id}: {e}");
                errors.push(format!("Could not load manual holdings: {e}"));
                sources_known = false;
            }
        }

        let raw: Vec<RawHolding> = raw
            .into_iter()
            .filter(|holding| match holding.validate() {
                Ok(()) => true,
                Err(e) => {
                    log::error!("Dropping invalid holding for {user_id}: {e}");
                    errors.push(format!("Rejected {} holding: {e}", holding.source));
                    false
                }
            })
            .collect();

        let (consolidated, rejected) = self.aggregation.try_aggregate(&raw);
        errors.extend(rejected.into_iter().map(|e| format!("Rejected holding: {e}")));

        for (coin, holding) in &consolidated {
            if holding.has_pricing_gap() {
                let reason = pricing
                    .failure_reason(coin)
                    .await
                    .unwrap_or_else(|| format!("Price unavailable for {coin}"));
                errors.push(reason);
            }
        }

        let metrics = self.metrics.compute(&consolidated);

        log::info!(
            "Cycle for {user_id}: {} coins from [{}], {} errors",
            consolidated.len(),
            active_sources
                .iter()
                .map(|s| s.key())
                .collect::<Vec<_>>()
                .join(","),
            errors.len()
        );

        CycleResult {
            user_id: user_id.to_string(),
            consolidated,
            metrics,
            active_sources,
            errors,
            has_credentials: credentials.has_any(),
            sources_known,
        }
    }
}
