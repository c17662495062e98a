pub mod registry;
pub mod traits;

// Venue ticker implementations
pub mod binance;
pub mod bybit;
