use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::models::holding::ConsolidatedHolding;
use crate::models::metrics::{AllocationEntry, CoinPnl, PortfolioMetrics};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Derives portfolio-level figures from consolidated holdings.
///
/// - Coins without a cost basis count toward `total_value` but not
///   `total_cost`, and get no P&L.
/// - A zero cost basis gives a P&L percentage of 0 instead of dividing by zero.
/// - Allocation is only produced when `total_value > 0`, and leaves out coins
///   that had no resolved price at all.
/// - Sums saturate rather than overflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsService;

impl MetricsService {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(&self, consolidated: &BTreeMap<String, ConsolidatedHolding>) -> PortfolioMetrics {
        let mut metrics = PortfolioMetrics::default();

        for (coin, holding) in consolidated {
            metrics.total_value = metrics.total_value.saturating_add(holding.total_value);

            if let Some(cost) = holding.original_value {
                metrics.total_cost = metrics.total_cost.saturating_add(cost);
                let absolute = holding.total_value.saturating_sub(cost);
                metrics.pnl.insert(
                    coin.clone(),
                    CoinPnl {
                        absolute,
                        percentage: percentage_of(absolute, cost),
                        unrealized: absolute,
                        realized: Decimal::ZERO,
                    },
                );
            }

            for source in &holding.sources {
                if let Some(value) = source.value {
                    let slot = metrics
                        .exchange_distribution
                        .entry(source.source)
                        .or_insert(Decimal::ZERO);
                    *slot = slot.saturating_add(value);
                }
            }
        }

        if metrics.total_value > Decimal::ZERO {
            let mut allocation: Vec<AllocationEntry> = consolidated
                .iter()
                .filter(|(_, h)| h.current_price.is_some())
                .map(|(coin, h)| {
                    let pnl = metrics.pnl.get(coin);
                    AllocationEntry {
                        coin: coin.clone(),
                        percentage: percentage_of(h.total_value, metrics.total_value),
                        value: h.total_value,
                        original_value: h.original_value,
                        pnl_absolute: pnl.map(|p| p.absolute),
                        pnl_percentage: pnl.map(|p| p.percentage),
                        price: h.current_price,
                    }
                })
                .collect();
            allocation.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.coin.cmp(&b.coin)));
            metrics.allocation = allocation;
        }

        if metrics.total_cost > Decimal::ZERO {
            let absolute = metrics.total_value.saturating_sub(metrics.total_cost);
            metrics.total_pnl_percentage = Some(percentage_of(absolute, metrics.total_cost));
        }

        metrics
    }
}

/// `part / whole * 100`, zero when `whole` is not positive. Saturates
/// instead of overflowing when `whole` is tiny next to `part`.
pub fn percentage_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(HUNDRED))
        .unwrap_or(if part.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        })
}
