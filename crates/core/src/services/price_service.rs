use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::CoreError;
use crate::models::price::{CyclePriceCache, PriceOutcome};
use crate::models::settings::{Settings, VenueSettings};
use crate::models::source::Venue;
use crate::net::retry::RetryPolicy;
use crate::providers::registry::PriceProviderRegistry;

/// Resolves current USD prices for coins on a given venue.
///
/// Resolution order for `resolve_price(coin, venue)`:
/// 1. The stablecoin is worth exactly 1, no network call.
/// 2. Coins in the venue's ignore set fail immediately with `SymbolIgnored`.
/// 3. The venue's override table maps the coin to its listed symbol, and the
///    quote asset is appended to form the pair.
/// 4. The venue provider is called under the shared `RetryPolicy`.
/// 5. Zero or negative quotes are rejected as `InvalidPrice`.
///
/// Stateless across calls: per-cycle caching lives in [`PricingCycle`].
pub struct PriceService {
    registry: PriceProviderRegistry,
    retry: RetryPolicy,
    stablecoin: String,
    quote_asset: String,
    venues: BTreeMap<Venue, VenueSettings>,
}

impl PriceService {
    pub fn new(registry: PriceProviderRegistry, settings: &Settings) -> Self {
        let venues = Venue::ALL
            .into_iter()
            .map(|v| (v, settings.venue(v).clone()))
            .collect();
        Self {
            registry,
            retry: RetryPolicy::from_settings(&settings.retry),
            stablecoin: settings.stablecoin.trim().to_uppercase(),
            quote_asset: settings.quote_asset.trim().to_uppercase(),
            venues,
        }
    }

    /// Replace the retry policy (tests use zero delays).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn stablecoin(&self) -> &str {
        &self.stablecoin
    }

    pub fn is_stablecoin(&self, coin: &str) -> bool {
        coin.eq_ignore_ascii_case(&self.stablecoin)
    }

    /// Trading pair for `coin` on `venue` after overrides (`BTC` → `BTCUSDT`).
    pub fn pair_for(&self, coin: &str, venue: Venue) -> String {
        let coin = coin.trim().to_uppercase();
        let listed = match self.venues.get(&venue) {
            Some(policy) => policy.listed_symbol(&coin),
            None => coin,
        };
        format!("{listed}{}", self.quote_asset)
    }

    /// Current positive USD price of `coin` on `venue`.
    pub async fn resolve_price(&self, coin: &str, venue: Venue) -> Result<Decimal, CoreError> {
        let coin = coin.trim().to_uppercase();
        if self.is_stablecoin(&coin) {
            return Ok(Decimal::ONE);
        }

        if self
            .venues
            .get(&venue)
            .is_some_and(|policy| policy.is_ignored(&coin))
        {
            return Err(CoreError::SymbolIgnored {
                symbol: coin,
                venue: venue.to_string(),
            });
        }

        let provider = self
            .registry
            .get_provider_for(venue)
            .ok_or_else(|| CoreError::NoProvider(venue.to_string()))?;

        let pair = self.pair_for(&coin, venue);
        let label = format!("{} price {pair}", provider.name());
        let symbol = pair.as_str();
        let price = self
            .retry
            .execute(&label, move || provider.fetch_price(symbol))
            .await?;

        if price <= Decimal::ZERO {
            return Err(CoreError::InvalidPrice {
                symbol: coin,
                price: price.to_string(),
            });
        }

        log::debug!("{label} = {price}");
        Ok(price)
    }

    /// Try `venues` in order; the first resolved price wins.
    pub async fn resolve_first(&self, coin: &str, venues: &[Venue]) -> Result<Decimal, CoreError> {
        let mut last_error = None;
        for venue in venues {
            match self.resolve_price(coin, *venue).await {
                Ok(price) => return Ok(price),
                Err(e) => {
                    log::debug!("No {venue} price for {coin}: {e}");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CoreError::NoProvider(coin.to_string())))
    }
}

/// Price resolution scoped to one fetch cycle.
///
/// Outcomes are cached per (coin, venue): each venue is asked about a coin
/// at most once per cycle, and concurrent askers share the request. A
/// failure on one venue never hides another venue a later caller lists.
pub struct PricingCycle {
    service: Arc<PriceService>,
    cache: CyclePriceCache,
    failures: Mutex<HashMap<String, String>>,
}

impl PricingCycle {
    pub fn new(service: Arc<PriceService>) -> Self {
        Self {
            service,
            cache: CyclePriceCache::new(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &PriceService {
        &self.service
    }

    /// Price for `coin` from the first of `venues` that has one.
    pub async fn price_for(&self, coin: &str, venues: &[Venue]) -> PriceOutcome {
        let coin = coin.trim().to_uppercase();
        if self.service.is_stablecoin(&coin) {
            return Ok(Decimal::ONE);
        }

        let service = self.service.as_ref();
        let symbol = coin.as_str();
        let mut last_failure = None;
        for &venue in venues {
            let outcome = self
                .cache
                .get_or_resolve(&cache_key(symbol, venue), || async move {
                    service
                        .resolve_price(symbol, venue)
                        .await
                        .map_err(|e| format!("Could not fetch price for {symbol}: {e}"))
                })
                .await;
            match outcome {
                Ok(price) => return Ok(price),
                Err(reason) => {
                    log::debug!("No {venue} price for {symbol}: {reason}");
                    last_failure = Some(reason);
                }
            }
        }

        let reason = last_failure
            .unwrap_or_else(|| format!("Could not fetch price for {symbol}: no venue to ask"));
        self.failures
            .lock()
            .await
            .insert(coin.clone(), reason.clone());
        Err(reason)
    }

    /// Why the last unpriced lookup of `coin` failed this cycle, if one did.
    pub async fn failure_reason(&self, coin: &str) -> Option<String> {
        self.failures
            .lock()
            .await
            .get(&coin.trim().to_uppercase())
            .cloned()
    }

    /// Number of (coin, venue) lookups settled so far this cycle.
    pub async fn resolved_count(&self) -> usize {
        self.cache.len().await
    }
}

fn cache_key(coin: &str, venue: Venue) -> String {
    format!("{coin}@{venue}")
}
