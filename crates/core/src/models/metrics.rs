use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::source::HoldingSource;

/// One coin's share of the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub coin: String,
    /// Share of portfolio total value, 0..=100
    pub percentage: Decimal,
    pub value: Decimal,
    pub original_value: Option<Decimal>,
    pub pnl_absolute: Option<Decimal>,
    pub pnl_percentage: Option<Decimal>,
    pub price: Option<Decimal>,
}

/// Profit/loss for a coin with known cost basis.
///
/// Everything is unrealized: no trade ledger exists, so `realized` is always zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinPnl {
    pub absolute: Decimal,
    pub percentage: Decimal,
    pub unrealized: Decimal,
    pub realized: Decimal,
}

/// Portfolio-level figures derived from consolidated holdings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub total_value: Decimal,

    /// Σ cost over coins with known cost basis only
    pub total_cost: Decimal,

    /// Sorted by value, largest first. Empty when `total_value` is zero.
    pub allocation: Vec<AllocationEntry>,

    pub exchange_distribution: BTreeMap<HoldingSource, Decimal>,

    /// Keyed by coin, present only for coins with known cost basis.
    pub pnl: BTreeMap<String, CoinPnl>,

    /// `None` when `total_cost` is zero.
    pub total_pnl_percentage: Option<Decimal>,
}

impl PortfolioMetrics {
    pub fn total_pnl_absolute(&self) -> Decimal {
        self.total_value - self.total_cost
    }

    pub fn allocation_for(&self, coin: &str) -> Option<&AllocationEntry> {
        self.allocation.iter().find(|a| a.coin == coin)
    }
}
