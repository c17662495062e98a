use serde::{Deserialize, Serialize};

/// A venue that can quote prices and hold balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    /// Single signed account call, spot balances only.
    Binance,
    /// Batched multi-account balance calls plus per-asset cost-basis lookups.
    Bybit,
}

impl Venue {
    pub const ALL: [Venue; 2] = [Venue::Binance, Venue::Bybit];
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Venue::Binance => write!(f, "Binance"),
            Venue::Bybit => write!(f, "Bybit"),
        }
    }
}

/// Where a holding was reported from.
///
/// Ordering is stable (Binance < Bybit < Manual) so sets of sources serialize
/// deterministically into snapshot fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldingSource {
    Binance,
    Bybit,
    Manual,
}

impl HoldingSource {
    /// The venue behind an exchange source; `None` for manual entries.
    pub fn venue(&self) -> Option<Venue> {
        match self {
            HoldingSource::Binance => Some(Venue::Binance),
            HoldingSource::Bybit => Some(Venue::Bybit),
            HoldingSource::Manual => None,
        }
    }

    /// Lowercase identifier used in fingerprints and response maps.
    pub fn key(&self) -> &'static str {
        match self {
            HoldingSource::Binance => "binance",
            HoldingSource::Bybit => "bybit",
            HoldingSource::Manual => "manual",
        }
    }
}

impl From<Venue> for HoldingSource {
    fn from(venue: Venue) -> Self {
        match venue {
            Venue::Binance => HoldingSource::Binance,
            Venue::Bybit => HoldingSource::Bybit,
        }
    }
}

impl std::fmt::Display for HoldingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HoldingSource::Binance => write!(f, "Binance"),
            HoldingSource::Bybit => write!(f, "Bybit"),
            HoldingSource::Manual => write!(f, "Manual"),
        }
    }
}
