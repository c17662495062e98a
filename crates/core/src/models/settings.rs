use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::errors::CoreError;
use crate::net::retry::RetrySettings;

use super::source::Venue;

/// Largest coin batch Bybit accepts in one balance query.
pub const MAX_BATCH_SIZE: usize = 10;

/// How a consolidated holding picks its representative `current_price`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePolicy {
    /// Price of the last priced contributor in input order.
    #[default]
    LastSeen,
    /// Σ value / Σ amount over priced contributors.
    AmountWeighted,
}

/// Per-venue endpoint and symbol policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueSettings {
    pub base_url: String,

    /// Internal ticker → ticker actually listed on this venue.
    pub symbol_overrides: HashMap<String, String>,

    /// Tickers known to have no quote pair on this venue.
    pub ignored_symbols: BTreeSet<String>,
}

impl VenueSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            symbol_overrides: HashMap::new(),
            ignored_symbols: BTreeSet::new(),
        }
    }

    /// Listed symbol for `coin`, honoring overrides.
    pub fn listed_symbol(&self, coin: &str) -> String {
        self.symbol_overrides
            .get(coin)
            .cloned()
            .unwrap_or_else(|| coin.to_string())
    }

    pub fn is_ignored(&self, coin: &str) -> bool {
        self.ignored_symbols.contains(coin)
    }
}

impl Default for VenueSettings {
    fn default() -> Self {
        Self::new("")
    }
}

/// Engine configuration. Every field has a default, so a partial JSON
/// document (or `{}`) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Priced at exactly 1 without any network call.
    pub stablecoin: String,

    /// Quote asset appended to a coin to form a ticker pair (BTC + USDT).
    pub quote_asset: String,

    pub retry: RetrySettings,

    /// Per-call HTTP timeout.
    pub request_timeout_secs: u64,

    pub recv_window_ms: u64,

    /// Coins per Bybit balance request (1..=10).
    pub batch_size: usize,

    pub binance: VenueSettings,
    pub bybit: VenueSettings,

    pub bybit_account_types: Vec<String>,

    /// Bybit has no "list everything" balance call, so balances are queried
    /// for this fixed list of coins.
    pub bybit_tracked_coins: Vec<String>,

    /// Venues tried, in order, to price manual holdings.
    pub manual_price_venues: Vec<Venue>,

    pub price_policy: PricePolicy,

    /// Users processed concurrently by a scheduled snapshot run.
    pub max_concurrent_users: usize,

    /// In-flight price and cost-basis requests per exchange within one cycle.
    pub max_requests_per_exchange: usize,

    /// Record a frequent snapshot after every non-empty portfolio view.
    pub record_snapshot_on_view: bool,

    /// History window used when a request carries a non-positive `days`.
    pub default_history_days: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stablecoin: "USDT".to_string(),
            quote_asset: "USDT".to_string(),
            retry: RetrySettings::default(),
            request_timeout_secs: 10,
            recv_window_ms: 5000,
            batch_size: MAX_BATCH_SIZE,
            binance: VenueSettings::new("https://api.binance.com"),
            bybit: VenueSettings::new("https://api.bybit.com"),
            bybit_account_types: vec!["UNIFIED".to_string(), "SPOT".to_string()],
            bybit_tracked_coins: default_tracked_coins(),
            manual_price_venues: vec![Venue::Bybit, Venue::Binance],
            price_policy: PricePolicy::default(),
            max_concurrent_users: 4,
            max_requests_per_exchange: 8,
            record_snapshot_on_view: true,
            default_history_days: 30,
        }
    }
}

impl Settings {
    /// Parse and validate settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a JSON settings file.
    pub fn load_from_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn venue(&self, venue: Venue) -> &VenueSettings {
        match venue {
            Venue::Binance => &self.binance,
            Venue::Bybit => &self.bybit,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.stablecoin.trim().is_empty() || self.quote_asset.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "stablecoin and quote_asset must be set".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(CoreError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(CoreError::ValidationError(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE} (got {})",
                self.batch_size
            )));
        }
        if self.max_concurrent_users == 0 {
            return Err(CoreError::ValidationError(
                "max_concurrent_users must be at least 1".into(),
            ));
        }
        if self.max_requests_per_exchange == 0 {
            return Err(CoreError::ValidationError(
                "max_requests_per_exchange must be at least 1".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::ValidationError(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_tracked_coins() -> Vec<String> {
    const COINS: &[&str] = &[
        "USDT", "BTC", "ETH", "SOL", "XRP", "MATIC", "DOGE", "ADA", "DOT", "AVAX", "LINK", "UNI",
        "SHIB", "LTC", "ATOM", "BCH", "NEAR", "APE", "FTM", "HBAR", "TRX", "OP", "ARB", "FLOW",
        "SAND", "MANA", "GALA", "IMX", "LDO", "RNDR", "SEI", "STX", "TIA", "AAVE", "ALGO", "AXS",
        "BABYDOGE", "BAND", "BAT", "BIT", "BTT", "CELR", "CHZ", "COMP", "CRO", "CRV", "DASH",
        "DYDX", "EGLD", "ENJ", "FIL", "GRT", "ICP", "ICX", "JASMY", "KAVA", "KLAY", "KSM", "LRC",
        "MINA", "MKR", "NANO", "OMG", "ONT", "OCEAN", "QTUM", "RAY", "REEF", "ROSE", "SNX",
        "STORJ", "SRM", "TFUEL", "THETA", "TON", "TWT", "VET", "XLM", "XEM", "XEC", "ZEC", "ZIL",
        "BLUR", "PEPE", "ORDI", "WLD", "SUI", "INJ", "CYBER", "BONK", "PYTH", "CFX", "AGIX", "JUP",
        "GMX", "1INCH", "CAKE", "DENT", "ENS",
    ];
    COINS.iter().map(|c| c.to_string()).collect()
}
