use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::errors::CoreError;
use crate::models::holding::{ConsolidatedHolding, RawHolding, SourceContribution};
use crate::models::settings::PricePolicy;

/// Merges raw holdings from every source into one record per coin.
///
/// Pure business logic, no I/O. Output depends only on the input slice and
/// the configured price policy, so aggregating the same input twice gives
/// identical results.
///
/// Rules per coin:
/// - `total_amount` and `transferable_amount` sum over every contributor
/// - `total_value` sums only contributors with a resolved price
/// - `original_value` sums only contributors that reported a cost basis and
///   stays `None` if none did
/// - `sources` keeps one entry per contributor in input order
/// - a holding that would overflow any of these sums is left out
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregationService {
    policy: PricePolicy,
}

impl AggregationService {
    pub fn new(policy: PricePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PricePolicy {
        self.policy
    }

    pub fn aggregate(&self, holdings: &[RawHolding]) -> BTreeMap<String, ConsolidatedHolding> {
        self.try_aggregate(holdings).0
    }

    /// Same as [`aggregate`](Self::aggregate), also returning one error per
    /// holding left out because its value, or a coin or portfolio total it
    /// feeds, would not fit in a `Decimal`.
    pub fn try_aggregate(
        &self,
        holdings: &[RawHolding],
    ) -> (BTreeMap<String, ConsolidatedHolding>, Vec<CoreError>) {
        let mut consolidated: BTreeMap<String, ConsolidatedHolding> = BTreeMap::new();
        let mut rejected = Vec::new();
        let mut portfolio_value = Decimal::ZERO;
        let mut portfolio_cost = Decimal::ZERO;

        for holding in holdings {
            let coin = holding.coin.trim().to_uppercase();
            let value = holding.current_value();
            let sums = if holding.current_price.is_some() && value.is_none() {
                None
            } else {
                let entry = consolidated.get(&coin);
                next_sums(entry, holding, value, portfolio_value, portfolio_cost)
            };

            let Some(sums) = sums else {
                log::warn!(
                    "Rejecting {} {} from {}: totals out of range",
                    holding.amount,
                    coin,
                    holding.source
                );
                rejected.push(CoreError::ValidationError(format!(
                    "{} {coin} from {} pushes totals out of range",
                    holding.amount, holding.source
                )));
                continue;
            };

            let entry = consolidated
                .entry(coin.clone())
                .or_insert_with(|| ConsolidatedHolding::empty(coin));
            entry.total_amount = sums.amount;
            entry.transferable_amount = sums.transferable;
            entry.total_value = sums.value;
            entry.original_value = sums.cost;
            portfolio_value = sums.portfolio_value;
            portfolio_cost = sums.portfolio_cost;

            if value.is_some() {
                // Last priced contributor wins under LastSeen
                entry.current_price = holding.current_price;
            }

            entry.sources.push(SourceContribution {
                source: holding.source,
                account_type: holding.account_type.clone(),
                amount: holding.amount,
                value,
            });
        }

        if self.policy == PricePolicy::AmountWeighted {
            for entry in consolidated.values_mut() {
                let priced = entry.priced_amount();
                if priced > Decimal::ZERO {
                    if let Some(price) = entry.total_value.checked_div(priced) {
                        entry.current_price = Some(price);
                    }
                }
            }
        }

        (consolidated, rejected)
    }
}

struct Sums {
    amount: Decimal,
    transferable: Decimal,
    value: Decimal,
    cost: Option<Decimal>,
    portfolio_value: Decimal,
    portfolio_cost: Decimal,
}

/// Running totals after adding `holding`, `None` if any would overflow.
fn next_sums(
    entry: Option<&ConsolidatedHolding>,
    holding: &RawHolding,
    value: Option<Decimal>,
    portfolio_value: Decimal,
    portfolio_cost: Decimal,
) -> Option<Sums> {
    let zero = Decimal::ZERO;
    let (amount, transferable, coin_value, coin_cost) = match entry {
        Some(e) => (e.total_amount, e.transferable_amount, e.total_value, e.original_value),
        None => (zero, zero, zero, None),
    };
    let value = value.unwrap_or(zero);
    let cost = match holding.original_value {
        Some(c) => Some(coin_cost.unwrap_or(zero).checked_add(c)?),
        None => coin_cost,
    };
    Some(Sums {
        amount: amount.checked_add(holding.amount)?,
        transferable: transferable.checked_add(holding.transferable_amount)?,
        value: coin_value.checked_add(value)?,
        cost,
        portfolio_value: portfolio_value.checked_add(value)?,
        portfolio_cost: portfolio_cost.checked_add(holding.original_value.unwrap_or(zero))?,
    })
}
