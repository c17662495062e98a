use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::holding::RawHolding;
use crate::models::manual::ManualEntry;
use crate::models::source::{HoldingSource, Venue};
use crate::services::price_service::PricingCycle;
use crate::storage::traits::ManualHoldingStore;

const ACCOUNT_TYPE: &str = "Manual";

/// Turns a user's manual entries into one priced raw holding per coin.
///
/// Entries are grouped by uppercase coin: amounts are summed, and so is
/// `amount * purchase_price`, which becomes the holding's cost basis.
/// Prices are tried on each venue of `price_venues` in order. A coin no
/// venue can price is still returned, unpriced, so it shows up as a
/// pricing gap rather than a zero value.
pub struct ManualHoldingsService {
    price_venues: Vec<Venue>,
}

impl ManualHoldingsService {
    pub fn new(price_venues: Vec<Venue>) -> Self {
        Self { price_venues }
    }

    pub fn price_venues(&self) -> &[Venue] {
        &self.price_venues
    }

    pub async fn list_manual_holdings(
        &self,
        store: &dyn ManualHoldingStore,
        user_id: &str,
        pricing: &PricingCycle,
    ) -> Result<Vec<RawHolding>, CoreError> {
        let entries = store.list_entries(user_id).await?;
        let grouped = group_entries(&entries);

        let prices = join_all(
            grouped
                .iter()
                .map(|(coin, _, _)| pricing.price_for(coin, &self.price_venues)),
        )
        .await;

        Ok(grouped
            .into_iter()
            .zip(prices)
            .map(|((coin, amount, cost), price)| {
                RawHolding::new(HoldingSource::Manual, ACCOUNT_TYPE, coin, amount)
                    .with_price(price.ok())
                    .with_original_value(Some(cost))
            })
            .collect())
    }
}

impl Default for ManualHoldingsService {
    fn default() -> Self {
        Self::new(vec![Venue::Bybit, Venue::Binance])
    }
}

/// `(coin, Σ amount, Σ amount × purchase_price)` in first-seen coin order.
/// Entries that fail validation, or would push a total out of range, are
/// skipped.
pub fn group_entries(entries: &[ManualEntry]) -> Vec<(String, Decimal, Decimal)> {
    let mut grouped: Vec<(String, Decimal, Decimal)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        if let Err(e) = entry.validate() {
            log::warn!("Skipping manual entry {}: {e}", entry.id);
            continue;
        }
        let Some(cost) = entry.cost() else {
            continue;
        };
        let coin = entry.coin.trim().to_uppercase();
        let slot = *index.entry(coin.clone()).or_insert_with(|| {
            grouped.push((coin, Decimal::ZERO, Decimal::ZERO));
            grouped.len() - 1
        });
        let (name, amount, total_cost) = &mut grouped[slot];
        match (amount.checked_add(entry.amount), total_cost.checked_add(cost)) {
            (Some(a), Some(c)) => {
                *amount = a;
                *total_cost = c;
            }
            _ => log::warn!("Skipping manual entry {}: {name} totals out of range", entry.id),
        }
    }

    grouped
}
