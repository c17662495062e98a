use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::holding::{ConsolidatedHolding, SourceContribution};
use super::metrics::AllocationEntry;
use super::snapshot::HistoryPoint;

/// Inbound request for one portfolio view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRequest {
    pub user_id: String,
    /// History window; when present the response carries a history series
    #[serde(default)]
    pub days: Option<i64>,
    /// Narrow the holdings list (and history) to one coin
    #[serde(default)]
    pub coin: Option<String>,
}

impl PortfolioRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            days: None,
            coin: None,
        }
    }

    pub fn with_days(mut self, days: i64) -> Self {
        self.days = Some(days);
        self
    }

    pub fn with_coin(mut self, coin: impl Into<String>) -> Self {
        self.coin = Some(coin.into());
        self
    }

    /// Uppercased, non-empty coin filter.
    pub fn coin_filter(&self) -> Option<String> {
        self.coin
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
    }
}

/// Per-source line of a holding in the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceView {
    pub exchange: String,
    pub account_type: String,
    pub amount: String,
    pub value: Option<f64>,
}

impl From<&SourceContribution> for SourceView {
    fn from(s: &SourceContribution) -> Self {
        Self {
            exchange: s.source.to_string(),
            account_type: s.account_type.clone(),
            amount: s.amount.normalize().to_string(),
            value: s.value.map(to_f64),
        }
    }
}

/// A consolidated holding as rendered to clients. Amounts keep full precision
/// as strings; monetary figures are floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingView {
    pub coin: String,
    pub total_amount: String,
    pub total_value: f64,
    pub current_price: Option<f64>,
    pub transferable: String,
    pub original_value: Option<f64>,
    pub pnl_absolute: Option<f64>,
    pub pnl_percentage: Option<f64>,
    pub sources: Vec<SourceView>,
}

impl HoldingView {
    pub fn from_consolidated(holding: &ConsolidatedHolding, allocation: Option<&AllocationEntry>) -> Self {
        Self {
            coin: holding.coin.clone(),
            total_amount: holding.total_amount.normalize().to_string(),
            total_value: to_f64(holding.total_value),
            current_price: holding.current_price.map(to_f64),
            transferable: holding.transferable_amount.normalize().to_string(),
            original_value: holding.original_value.map(to_f64),
            pnl_absolute: allocation.and_then(|a| a.pnl_absolute).map(to_f64),
            pnl_percentage: allocation.and_then(|a| a.pnl_percentage).map(to_f64),
            sources: holding.sources.iter().map(SourceView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationView {
    pub coin: String,
    pub percentage: f64,
    pub value: f64,
    pub original_value: Option<f64>,
    pub pnl_absolute: Option<f64>,
    pub pnl_percentage: Option<f64>,
    pub price: Option<f64>,
}

impl From<&AllocationEntry> for AllocationView {
    fn from(a: &AllocationEntry) -> Self {
        Self {
            coin: a.coin.clone(),
            percentage: to_f64(a.percentage),
            value: to_f64(a.value),
            original_value: a.original_value.map(to_f64),
            pnl_absolute: a.pnl_absolute.map(to_f64),
            pnl_percentage: a.pnl_percentage.map(to_f64),
            price: a.price.map(to_f64),
        }
    }
}

/// Structured result of one portfolio view.
///
/// `errors` is `None` when the cycle had no problems, never an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioResponse {
    pub portfolio: Vec<HoldingView>,
    pub total_value: f64,
    pub total_cost: f64,
    pub total_pnl_percentage: Option<f64>,
    pub allocation: Vec<AllocationView>,
    pub exchange_distribution: BTreeMap<String, f64>,
    pub daily_pnl: Option<f64>,
    pub daily_pnl_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryPoint>>,
    pub errors: Option<Vec<String>>,
    pub has_credentials: bool,
}

impl PortfolioResponse {
    /// The valid response for a user with nothing configured.
    pub fn empty(has_credentials: bool) -> Self {
        Self {
            has_credentials,
            ..Self::default()
        }
    }
}

/// Decimal → f64 at the serialization boundary. Values outside f64 range
/// cannot occur for USD figures; they read as zero.
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
