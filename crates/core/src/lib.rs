pub mod errors;
pub mod exchanges;
pub mod models;
pub mod net;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use errors::CoreError;
use exchanges::{binance::BinanceFetcher, bybit::BybitFetcher, traits::HoldingsFetcher};
use models::{
    manual::ManualEntry,
    response::{to_f64, AllocationView, HoldingView, PortfolioRequest, PortfolioResponse},
    settings::Settings,
    snapshot::{HistoryPoint, HistoryQuery, PortfolioSnapshot, SnapshotKind, SnapshotRunReport},
    source::HoldingSource,
};
use net::{
    retry::RetryPolicy,
    transport::{HttpTransport, ReqwestTransport},
};
use providers::registry::PriceProviderRegistry;
use services::{
    aggregation_service::AggregationService,
    manual_service::ManualHoldingsService,
    portfolio_service::{CycleResult, PortfolioService},
    price_service::PriceService,
    snapshot_service::SnapshotService,
};
use storage::traits::Collaborators;

/// Main entry point for the portfolio tracker core library.
/// Owns the configured services and the collaborators they read from.
#[must_use]
pub struct PortfolioTracker {
    settings: Settings,
    collaborators: Collaborators,
    portfolio_service: PortfolioService,
    snapshot_service: SnapshotService,
}

impl std::fmt::Debug for PortfolioTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioTracker")
            .field("stablecoin", &self.settings.stablecoin)
            .field("price_policy", &self.settings.price_policy)
            .field("max_concurrent_users", &self.settings.max_concurrent_users)
            .field("record_snapshot_on_view", &self.settings.record_snapshot_on_view)
            .finish()
    }
}

impl PortfolioTracker {
    /// Tracker talking to the real venues over a pooled reqwest client.
    pub fn new(settings: Settings, collaborators: Collaborators) -> Result<Self, CoreError> {
        let transport = ReqwestTransport::new(Duration::from_secs(settings.request_timeout_secs))?;
        Self::with_transport(settings, collaborators, Arc::new(transport))
    }

    /// Tracker over a caller-supplied transport (tests script one).
    pub fn with_transport(
        settings: Settings,
        collaborators: Collaborators,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self::build(settings, collaborators, transport))
    }

    fn build(
        settings: Settings,
        collaborators: Collaborators,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let retry = RetryPolicy::from_settings(&settings.retry);

        let registry = PriceProviderRegistry::new_with_defaults(transport.clone(), &settings);
        let price_service = Arc::new(PriceService::new(registry, &settings));

        let binance = BinanceFetcher::new(
            transport.clone(),
            settings.binance.base_url.clone(),
            settings.recv_window_ms,
            retry,
        )
        .with_max_in_flight(settings.max_requests_per_exchange);
        let bybit = BybitFetcher::new(
            transport,
            settings.bybit.base_url.clone(),
            settings.recv_window_ms,
            retry,
        )
        .with_account_types(settings.bybit_account_types.clone())
        .with_tracked_coins(&settings.bybit_tracked_coins)
        .with_batch_size(settings.batch_size)
        .with_max_in_flight(settings.max_requests_per_exchange);
        let fetchers: Vec<Arc<dyn HoldingsFetcher>> = vec![Arc::new(binance), Arc::new(bybit)];

        let portfolio_service = PortfolioService::new(
            price_service,
            fetchers,
            ManualHoldingsService::new(settings.manual_price_venues.clone()),
            AggregationService::new(settings.price_policy),
        );
        let snapshot_service = SnapshotService::new(collaborators.snapshots.clone());

        Self {
            settings,
            collaborators,
            portfolio_service,
            snapshot_service,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Manual Holdings ─────────────────────────────────────────────

    /// Record a manual holding. Amount and purchase price must be positive.
    pub async fn add_manual_holding(
        &self,
        user_id: &str,
        coin: &str,
        amount: Decimal,
        purchase_price: Decimal,
    ) -> Result<uuid::Uuid, CoreError> {
        let entry = ManualEntry::new(coin, amount, purchase_price);
        entry.validate()?;
        let id = entry.id;
        self.collaborators
            .manual_holdings
            .add_entry(user_id, entry)
            .await?;
        Ok(id)
    }

    // ── Portfolio View ──────────────────────────────────────────────

    /// One fetch cycle without any response shaping or snapshot side effects.
    pub async fn run_cycle(&self, user_id: &str) -> CycleResult {
        self.portfolio_service
            .run_cycle(
                user_id,
                self.collaborators.credentials.as_ref(),
                self.collaborators.manual_holdings.as_ref(),
            )
            .await
    }

    /// Full portfolio view: fetch, consolidate, value, and (for a non-empty
    /// portfolio) record a frequent snapshot.
    ///
    /// Never fails. Partial results come back with `errors` set.
    pub async fn fetch_portfolio(&self, request: &PortfolioRequest) -> PortfolioResponse {
        let user_id = request.user_id.as_str();
        let cycle = self.run_cycle(user_id).await;
        let mut errors = cycle.errors.clone();

        if cycle.is_empty() {
            return PortfolioResponse {
                errors: (!errors.is_empty()).then_some(errors),
                ..PortfolioResponse::empty(cycle.has_credentials)
            };
        }

        let now = Utc::now();
        let metrics = &cycle.metrics;

        // Unknown configuration: nothing here is comparable to stored snapshots
        let comparable = cycle.sources_known;

        let daily = if comparable {
            match self
                .snapshot_service
                .daily_change(user_id, metrics.total_value, &cycle.active_sources, now)
                .await
            {
                Ok(daily) => daily,
                Err(e) => {
                    log::warn!("Daily P&L lookup failed for {user_id}: {e}");
                    None
                }
            }
        } else {
            None
        };

        if self.settings.record_snapshot_on_view && comparable {
            if let Err(e) = self
                .snapshot_service
                .record(
                    user_id,
                    metrics,
                    &cycle.consolidated,
                    &cycle.active_sources,
                    SnapshotKind::Frequent,
                )
                .await
            {
                log::error!("Failed to record snapshot for {user_id}: {e}");
            }
        }

        let coin_filter = request.coin_filter();

        let history = match request.days {
            Some(days) if comparable => {
                let query = HistoryQuery::new(user_id, Some(days), self.settings.default_history_days)
                    .with_coin(coin_filter.as_deref());
                match self
                    .snapshot_service
                    .history_points(&query, &cycle.active_sources, now)
                    .await
                {
                    Ok(points) => Some(points),
                    Err(e) => {
                        log::warn!("History lookup failed for {user_id}: {e}");
                        errors.push(format!("Could not load history: {e}"));
                        None
                    }
                }
            }
            Some(_) => {
                errors.push("History unavailable while configured sources are unknown".to_string());
                None
            }
            None => None,
        };

        let mut holdings: Vec<_> = cycle
            .consolidated
            .values()
            .filter(|h| coin_filter.as_deref().is_none_or(|c| h.coin == c))
            .collect();
        holdings.sort_by(|a, b| {
            b.total_value
                .cmp(&a.total_value)
                .then_with(|| a.coin.cmp(&b.coin))
        });

        PortfolioResponse {
            portfolio: holdings
                .into_iter()
                .map(|h| HoldingView::from_consolidated(h, metrics.allocation_for(&h.coin)))
                .collect(),
            total_value: to_f64(metrics.total_value),
            total_cost: to_f64(metrics.total_cost),
            total_pnl_percentage: metrics.total_pnl_percentage.map(to_f64),
            allocation: metrics.allocation.iter().map(AllocationView::from).collect(),
            exchange_distribution: metrics
                .exchange_distribution
                .iter()
                .map(|(source, value)| (source.to_string(), to_f64(*value)))
                .collect(),
            daily_pnl: daily.as_ref().map(|d| to_f64(d.absolute)),
            daily_pnl_percentage: daily.as_ref().map(|d| to_f64(d.percentage)),
            history,
            errors: (!errors.is_empty()).then_some(errors),
            has_credentials: cycle.has_credentials,
        }
    }

    // ── Snapshots ───────────────────────────────────────────────────

    /// Run a cycle for `user_id` and append a snapshot of it.
    /// Returns `None` (and writes nothing) when the portfolio is empty or
    /// the user's configured sources could not be read.
    pub async fn record_snapshot(
        &self,
        user_id: &str,
        kind: SnapshotKind,
    ) -> Result<Option<PortfolioSnapshot>, CoreError> {
        let cycle = self.run_cycle(user_id).await;
        if cycle.is_empty() {
            log::debug!("Nothing to snapshot for {user_id}");
            return Ok(None);
        }
        if !cycle.sources_known {
            log::warn!(
                "Skipping snapshot for {user_id}: configured sources unknown ({})",
                cycle.errors.join("; ")
            );
            return Ok(None);
        }
        for error in &cycle.errors {
            log::warn!("Snapshot cycle for {user_id}: {error}");
        }
        let snapshot = self
            .snapshot_service
            .record(
                user_id,
                &cycle.metrics,
                &cycle.consolidated,
                &cycle.active_sources,
                kind,
            )
            .await?;
        Ok(Some(snapshot))
    }

    /// Snapshot every known user, at most `max_concurrent_users` at a time.
    ///
    /// One user's failure (or slow retries) never stops the others.
    pub async fn run_snapshot_cycle(&self, kind: SnapshotKind) -> Result<SnapshotRunReport, CoreError> {
        let users = self.collaborators.users.list_users().await?;
        log::info!("Starting {kind} snapshot run for {} users", users.len());

        let outcomes: Vec<(String, Result<Option<PortfolioSnapshot>, CoreError>)> =
            stream::iter(users)
                .map(|user_id| async move {
                    let result = self.record_snapshot(&user_id, kind).await;
                    (user_id, result)
                })
                .buffer_unordered(self.settings.max_concurrent_users)
                .collect()
                .await;

        let mut report = SnapshotRunReport::new(kind);
        for (user_id, result) in outcomes {
            report.users += 1;
            match result {
                Ok(Some(_)) => report.recorded += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    log::error!("{kind} snapshot failed for {user_id}: {e}");
                    report.failures.push((user_id, e.to_string()));
                }
            }
        }

        log::info!(
            "{kind} snapshot run: {} users, {} recorded, {} skipped, {} failed",
            report.users,
            report.recorded,
            report.skipped,
            report.failures.len()
        );
        Ok(report)
    }

    /// Entry point for the 30-minute cadence.
    pub async fn run_frequent_snapshots(&self) -> Result<SnapshotRunReport, CoreError> {
        self.run_snapshot_cycle(SnapshotKind::Frequent).await
    }

    /// Entry point for the daily cadence.
    pub async fn run_daily_snapshots(&self) -> Result<SnapshotRunReport, CoreError> {
        self.run_snapshot_cycle(SnapshotKind::Daily).await
    }

    // ── History ─────────────────────────────────────────────────────

    /// Sources the user has configured right now, without touching any venue.
    pub async fn current_sources(&self, user_id: &str) -> Result<BTreeSet<HoldingSource>, CoreError> {
        let credentials = self.collaborators.credentials.get_credentials(user_id).await?;
        let mut sources = credentials.active_sources();
        let manual = self
            .collaborators
            .manual_holdings
            .list_entries(user_id)
            .await?;
        if manual.iter().any(|e| e.validate().is_ok()) {
            sources.insert(HoldingSource::Manual);
        }
        Ok(sources)
    }

    /// Comparable history for `user_id`, oldest first. Non-positive or
    /// missing `days` falls back to the configured default window.
    pub async fn history(
        &self,
        user_id: &str,
        days: Option<i64>,
        coin: Option<&str>,
    ) -> Result<Vec<HistoryPoint>, CoreError> {
        let query = HistoryQuery::new(user_id, days, self.settings.default_history_days).with_coin(coin);
        let sources = self.current_sources(user_id).await?;
        self.snapshot_service
            .history_points(&query, &sources, Utc::now())
            .await
    }

    /// Same as [`history`](Self::history), restricted to one snapshot kind.
    pub async fn history_of_kind(
        &self,
        user_id: &str,
        days: Option<i64>,
        kind: SnapshotKind,
    ) -> Result<Vec<HistoryPoint>, CoreError> {
        let query = HistoryQuery::new(user_id, days, self.settings.default_history_days).with_kind(kind);
        let sources = self.current_sources(user_id).await?;
        self.snapshot_service
            .history_points(&query, &sources, Utc::now())
            .await
    }
}
