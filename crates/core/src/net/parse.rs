use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::CoreError;

/// Parse a venue-supplied decimal string ("0.00120000", "1e-8", "").
///
/// Empty strings read as zero: venues use them for unset balance fields.
pub fn parse_decimal(provider: &str, field: &str, raw: &str) -> Result<Decimal, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map(|d| d.normalize())
        .map_err(|e| CoreError::Api {
            provider: provider.to_string(),
            message: format!("Invalid decimal in '{field}': {raw:?} ({e})"),
        })
}
