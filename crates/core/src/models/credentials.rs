use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::source::{HoldingSource, Venue};

/// API key/secret pair for one venue.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl ExchangeCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Both halves present and non-blank.
    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }

    /// `********abcd` style rendering of the key for display.
    pub fn masked_key(&self) -> String {
        let key = self.api_key.trim();
        let tail: String = key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}{}", "*".repeat(8), tail)
    }
}

// Never print secrets.
impl std::fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeCredentials")
            .field("api_key", &self.masked_key())
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Everything the credential store holds for one user. Any venue may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub binance: Option<ExchangeCredentials>,
    pub bybit: Option<ExchangeCredentials>,
}

impl UserCredentials {
    /// Credentials for `venue`, only if complete.
    pub fn for_venue(&self, venue: Venue) -> Option<&ExchangeCredentials> {
        let creds = match venue {
            Venue::Binance => self.binance.as_ref(),
            Venue::Bybit => self.bybit.as_ref(),
        };
        creds.filter(|c| c.is_complete())
    }

    /// Venues with complete credentials, in stable order.
    pub fn configured_venues(&self) -> Vec<Venue> {
        Venue::ALL
            .into_iter()
            .filter(|v| self.for_venue(*v).is_some())
            .collect()
    }

    pub fn has_any(&self) -> bool {
        !self.configured_venues().is_empty()
    }

    /// Exchange sources that are configured right now.
    pub fn active_sources(&self) -> BTreeSet<HoldingSource> {
        self.configured_venues()
            .into_iter()
            .map(HoldingSource::from)
            .collect()
    }
}
