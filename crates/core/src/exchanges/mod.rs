pub mod traits;

// Venue balance fetchers
pub mod binance;
pub mod bybit;
