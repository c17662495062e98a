use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::holding::ConsolidatedHolding;
use crate::models::metrics::PortfolioMetrics;
use crate::models::response::to_f64;
use crate::models::snapshot::{
    DailyChange, HistoryPoint, HistoryQuery, PortfolioSnapshot, SnapshotKind,
};
use crate::models::source::HoldingSource;
use crate::services::metrics_service::percentage_of;
use crate::storage::traits::SnapshotStore;

/// Records immutable portfolio snapshots and reads comparable history back.
///
/// "Comparable" means recorded with the same set of active sources as the
/// user has now. A user who drops an exchange should see a fresh series,
/// not a cliff that looks like a price crash.
pub struct SnapshotService {
    store: Arc<dyn SnapshotStore>,
    // Serializes latest-then-append per user so timestamps stay strictly increasing.
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SnapshotService {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Append a snapshot of the current valuation.
    ///
    /// `coin_values` holds only coins with a resolved price. The timestamp is
    /// the current time, nudged forward by a microsecond when the clock has
    /// not moved past the user's latest snapshot.
    pub async fn record(
        &self,
        user_id: &str,
        metrics: &PortfolioMetrics,
        consolidated: &BTreeMap<String, ConsolidatedHolding>,
        active_sources: &BTreeSet<HoldingSource>,
        kind: SnapshotKind,
    ) -> Result<PortfolioSnapshot, CoreError> {
        let lock = self.lock_for(user_id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let timestamp = match self.store.latest(user_id).await? {
            Some(last) if now <= last.timestamp => last.timestamp + Duration::microseconds(1),
            _ => now,
        };

        let coin_values = consolidated
            .iter()
            .filter(|(_, h)| h.current_price.is_some())
            .map(|(coin, h)| (coin.clone(), h.total_value))
            .collect();

        let snapshot = PortfolioSnapshot {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            timestamp,
            total_value: metrics.total_value,
            coin_values,
            active_sources: active_sources.clone(),
            kind,
        };
        self.store.append(snapshot.clone()).await?;

        log::info!(
            "Recorded {kind} snapshot for {user_id}: ${} across [{}]",
            snapshot.total_value.round_dp(2),
            snapshot.fingerprint()
        );
        Ok(snapshot)
    }

    /// Comparable snapshots inside the query window, oldest first.
    pub async fn history(
        &self,
        query: &HistoryQuery,
        current_sources: &BTreeSet<HoldingSource>,
        now: DateTime<Utc>,
    ) -> Result<Vec<PortfolioSnapshot>, CoreError> {
        let snapshots = self
            .store
            .list_range(&query.user_id, Some(query.since(now)), None)
            .await?;
        Ok(snapshots
            .into_iter()
            .filter(|s| &s.active_sources == current_sources)
            .filter(|s| query.kind.is_none_or(|k| s.kind == k))
            .collect())
    }

    /// `history` rendered as `(timestamp, value)` points, per coin when the
    /// query names one.
    pub async fn history_points(
        &self,
        query: &HistoryQuery,
        current_sources: &BTreeSet<HoldingSource>,
        now: DateTime<Utc>,
    ) -> Result<Vec<HistoryPoint>, CoreError> {
        let coin = query.coin.as_deref();
        Ok(self
            .history(query, current_sources, now)
            .await?
            .iter()
            .map(|s| HistoryPoint {
                timestamp: s.timestamp,
                value: to_f64(s.value_for(coin)),
            })
            .collect())
    }

    /// Change against the newest comparable snapshot taken at least 24h
    /// before `now` with a positive total. `None` when there is none.
    pub async fn daily_change(
        &self,
        user_id: &str,
        current_total: Decimal,
        current_sources: &BTreeSet<HoldingSource>,
        now: DateTime<Utc>,
    ) -> Result<Option<DailyChange>, CoreError> {
        let cutoff = now - Duration::hours(24);
        let older = self.store.list_range(user_id, None, Some(cutoff)).await?;
        let reference = older
            .iter()
            .rev()
            .find(|s| &s.active_sources == current_sources && s.total_value > Decimal::ZERO);

        Ok(reference.map(|previous| {
            let absolute = current_total.saturating_sub(previous.total_value);
            DailyChange {
                absolute,
                percentage: percentage_of(absolute, previous.total_value),
            }
        }))
    }
}
