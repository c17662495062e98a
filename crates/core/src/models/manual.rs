use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;

/// A holding the user typed in by hand, with the price they paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualEntry {
    pub id: Uuid,

    /// Uppercase ticker symbol
    pub coin: String,

    pub amount: Decimal,

    /// Price per unit at purchase time, in USD
    pub purchase_price: Decimal,

    pub purchase_date: DateTime<Utc>,
}

impl ManualEntry {
    pub fn new(coin: impl Into<String>, amount: Decimal, purchase_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            coin: coin.into().trim().to_uppercase(),
            amount,
            purchase_price,
            purchase_date: Utc::now(),
        }
    }

    /// `amount * purchase_price`, `None` on overflow.
    pub fn cost(&self) -> Option<Decimal> {
        self.amount.checked_mul(self.purchase_price)
    }

    /// Coin must be present, amount and purchase price positive, and their
    /// product representable.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.coin.is_empty() {
            return Err(CoreError::ValidationError("Coin symbol is required".into()));
        }
        if self.amount <= Decimal::ZERO || self.purchase_price <= Decimal::ZERO {
            return Err(CoreError::ValidationError(format!(
                "Amount and purchase price must be positive (got {} {} @ {})",
                self.amount, self.coin, self.purchase_price
            )));
        }
        if self.cost().is_none() {
            return Err(CoreError::ValidationError(format!(
                "Cost of {} {} @ {} is out of range",
                self.amount, self.coin, self.purchase_price
            )));
        }
        Ok(())
    }
}
