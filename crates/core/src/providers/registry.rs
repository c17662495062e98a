use std::sync::Arc;

use super::binance::BinancePriceProvider;
use super::bybit::BybitPriceProvider;
use super::traits::PriceProvider;
use crate::models::settings::Settings;
use crate::models::source::Venue;
use crate::net::transport::HttpTransport;

/// Registry of all available price providers.
///
/// Routes requests to the provider quoting a given venue. New venues can be
/// registered without touching the resolver.
pub struct PriceProviderRegistry {
    providers: Vec<Box<dyn PriceProvider>>,
}

impl PriceProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Binance and Bybit tickers over one shared transport.
    pub fn new_with_defaults(transport: Arc<dyn HttpTransport>, settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BinancePriceProvider::new(
            transport.clone(),
            settings.binance.base_url.clone(),
        )));
        registry.register(Box::new(BybitPriceProvider::new(
            transport,
            settings.bybit.base_url.clone(),
        )));
        registry
    }

    /// Register a provider. A later registration for the same venue never
    /// shadows an earlier one.
    pub fn register(&mut self, provider: Box<dyn PriceProvider>) {
        self.providers.push(provider);
    }

    /// First provider registered for `venue`.
    pub fn get_provider_for(&self, venue: Venue) -> Option<&dyn PriceProvider> {
        self.providers
            .iter()
            .find(|p| p.venue() == venue)
            .map(|p| p.as_ref())
    }

    pub fn venues(&self) -> Vec<Venue> {
        let mut venues: Vec<Venue> = self.providers.iter().map(|p| p.venue()).collect();
        venues.sort();
        venues.dedup();
        venues
    }
}

impl Default for PriceProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
