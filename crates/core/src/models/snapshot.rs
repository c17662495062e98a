use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::source::HoldingSource;

/// Cadence a snapshot was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// Every 30 minutes, and after each portfolio view.
    Frequent,
    /// Once per day.
    Daily,
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotKind::Frequent => write!(f, "frequent"),
            SnapshotKind::Daily => write!(f, "daily"),
        }
    }
}

/// Immutable point-in-time portfolio summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub id: Uuid,
    pub user_id: String,

    /// Server-assigned, strictly increasing per user.
    pub timestamp: DateTime<Utc>,

    pub total_value: Decimal,

    /// Coin → value at that instant (priced coins only)
    pub coin_values: BTreeMap<String, Decimal>,

    /// Sources with valid configuration at fetch time
    pub active_sources: BTreeSet<HoldingSource>,

    pub kind: SnapshotKind,
}

impl PortfolioSnapshot {
    /// Stable, order-independent rendering of `active_sources` ("binance,manual").
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.active_sources)
    }

    /// Value used for a history series: the coin's value when filtering by coin,
    /// the portfolio total otherwise. A coin absent from the snapshot reads as zero.
    pub fn value_for(&self, coin: Option<&str>) -> Decimal {
        match coin {
            Some(c) => self.coin_values.get(c).copied().unwrap_or(Decimal::ZERO),
            None => self.total_value,
        }
    }
}

pub fn fingerprint_of(sources: &BTreeSet<HoldingSource>) -> String {
    sources
        .iter()
        .map(|s| s.key())
        .collect::<Vec<_>>()
        .join(",")
}

/// Filter for reading a user's snapshot series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub user_id: String,
    pub days: i64,
    /// Uppercased on construction
    pub coin: Option<String>,
    /// `None` accepts every kind
    pub kind: Option<SnapshotKind>,
}

impl HistoryQuery {
    /// Non-positive `days` falls back to `default_days`.
    pub fn new(user_id: impl Into<String>, days: Option<i64>, default_days: i64) -> Self {
        let days = match days {
            Some(d) if d > 0 => d,
            _ => default_days,
        };
        Self {
            user_id: user_id.into(),
            days,
            coin: None,
            kind: None,
        }
    }

    pub fn with_coin(mut self, coin: Option<&str>) -> Self {
        self.coin = coin
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());
        self
    }

    pub fn with_kind(mut self, kind: SnapshotKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Earliest timestamp included, relative to `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days)
    }
}

/// One point of a history series, serialized for the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Change against the newest comparable snapshot at least a day old.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyChange {
    pub absolute: Decimal,
    pub percentage: Decimal,
}

/// Summary of one scheduled snapshot run across all users.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRunReport {
    pub kind: SnapshotKind,
    pub users: usize,
    pub recorded: usize,
    /// Users with nothing to value (no credentials, no manual holdings, or
    /// every source failed), or whose configured sources could not be read
    pub skipped: usize,
    /// `(user_id, error)` for users whose snapshot could not be written
    pub failures: Vec<(String, String)>,
}

impl SnapshotRunReport {
    pub fn new(kind: SnapshotKind) -> Self {
        Self {
            kind,
            users: 0,
            recorded: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }
}
