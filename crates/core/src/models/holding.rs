use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

use super::source::HoldingSource;

/// One balance as reported by a single source, priced at fetch time.
///
/// Ephemeral: produced by a fetcher or the manual source, consumed by the
/// aggregator within the same cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHolding {
    pub source: HoldingSource,

    /// Free-text account classification ("Spot", "UNIFIED", "Manual", ...)
    pub account_type: String,

    /// Uppercase ticker symbol
    pub coin: String,

    /// Quantity held (never negative)
    pub amount: Decimal,

    /// Withdrawable part of `amount`
    pub transferable_amount: Decimal,

    /// USD price at fetch time, `None` when unresolved
    pub current_price: Option<Decimal>,

    /// Cost basis in USD, `None` when unknown (distinct from zero)
    pub original_value: Option<Decimal>,
}

impl RawHolding {
    /// Create an unpriced holding whose transferable amount equals `amount`.
    pub fn new(
        source: HoldingSource,
        account_type: impl Into<String>,
        coin: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            source,
            account_type: account_type.into(),
            coin: coin.into().trim().to_uppercase(),
            amount,
            transferable_amount: amount,
            current_price: None,
            original_value: None,
        }
    }

    pub fn with_transferable(mut self, transferable: Decimal) -> Self {
        self.transferable_amount = transferable;
        self
    }

    pub fn with_price(mut self, price: Option<Decimal>) -> Self {
        self.current_price = price;
        self
    }

    pub fn with_original_value(mut self, original_value: Option<Decimal>) -> Self {
        self.original_value = original_value;
        self
    }

    /// `amount * current_price`, absent when the price is absent or the
    /// product does not fit in a `Decimal`.
    pub fn current_value(&self) -> Option<Decimal> {
        self.current_price.and_then(|p| self.amount.checked_mul(p))
    }

    /// Reject values that must never reach the aggregator.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.coin.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "Holding from {} has an empty coin symbol",
                self.source
            )));
        }
        if self.amount.is_sign_negative() {
            return Err(CoreError::ValidationError(format!(
                "Negative amount {} for {} from {}",
                self.amount, self.coin, self.source
            )));
        }
        if self.transferable_amount.is_sign_negative() {
            return Err(CoreError::ValidationError(format!(
                "Negative transferable amount {} for {} from {}",
                self.transferable_amount, self.coin, self.source
            )));
        }
        if let Some(price) = self.current_price {
            if price <= Decimal::ZERO {
                return Err(CoreError::InvalidPrice {
                    symbol: self.coin.clone(),
                    price: price.to_string(),
                });
            }
            if self.amount.checked_mul(price).is_none() {
                return Err(CoreError::ValidationError(format!(
                    "Value of {} {} at {price} is out of range",
                    self.amount, self.coin
                )));
            }
        }
        Ok(())
    }
}

/// Result of one fetcher run: whatever was fetched plus non-fatal errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub holdings: Vec<RawHolding>,
    pub errors: Vec<String>,
}

impl FetchOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            holdings: Vec::new(),
            errors: vec![error.into()],
        }
    }

    pub fn merge(&mut self, other: FetchOutcome) {
        self.holdings.extend(other.holdings);
        self.errors.extend(other.errors);
    }
}

/// One source's contribution to a consolidated coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceContribution {
    pub source: HoldingSource,
    pub account_type: String,
    pub amount: Decimal,
    /// `None` when that source's holding had no resolved price
    pub value: Option<Decimal>,
}

/// All holdings of one coin merged across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedHolding {
    pub coin: String,

    /// Σ amount across all contributors, priced or not
    pub total_amount: Decimal,

    /// Σ value across priced contributors only
    pub total_value: Decimal,

    /// Representative price (see `PricePolicy`); `None` if no contributor was priced
    pub current_price: Option<Decimal>,

    /// Σ transferable amount
    pub transferable_amount: Decimal,

    /// Σ cost basis across contributors that reported one; `None` if none did
    pub original_value: Option<Decimal>,

    /// Contributions in input order
    pub sources: Vec<SourceContribution>,
}

impl ConsolidatedHolding {
    pub fn empty(coin: impl Into<String>) -> Self {
        Self {
            coin: coin.into(),
            total_amount: Decimal::ZERO,
            total_value: Decimal::ZERO,
            current_price: None,
            transferable_amount: Decimal::ZERO,
            original_value: None,
            sources: Vec::new(),
        }
    }

    /// Σ amount over contributors that had a resolved price.
    pub fn priced_amount(&self) -> Decimal {
        self.sources
            .iter()
            .filter(|s| s.value.is_some())
            .map(|s| s.amount)
            .sum()
    }

    /// True when at least one contributor had no resolved price.
    pub fn has_pricing_gap(&self) -> bool {
        self.sources.iter().any(|s| s.value.is_none())
    }
}
