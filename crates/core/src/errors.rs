use thiserror::Error;

use crate::net::retry::RetryClass;

/// Unified error type for the entire portfolio-tracker-core library.
/// Every public function returns `Result<T, CoreError>`.
///
/// Fetch cycles never surface these across the crate boundary for expected
/// failures (network, missing price, missing credentials): they are rendered
/// into the cycle's error list instead.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Storage / File ──────────────────────────────────────────────
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("HTTP {status} from {provider}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("No price provider registered for venue: {0}")]
    NoProvider(String),

    // ── Pricing ─────────────────────────────────────────────────────
    #[error("Price not available for {symbol} on {venue}")]
    PriceNotAvailable { symbol: String, venue: String },

    #[error("Invalid price for {symbol}: {price} (must be positive)")]
    InvalidPrice { symbol: String, price: String },

    #[error("Symbol {symbol} is not tradeable on {venue}")]
    SymbolIgnored { symbol: String, venue: String },

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl CoreError {
    /// How a retry policy should react to this error.
    ///
    /// Timeouts, connection failures, rate limits and server-side (5xx)
    /// responses are transient. Everything else terminates immediately.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            CoreError::Timeout(_) | CoreError::Network(_) | CoreError::RateLimited { .. } => {
                RetryClass::WithBackoff
            }
            CoreError::Http { status, .. } if *status == 429 || *status >= 500 => {
                RetryClass::WithBackoff
            }
            _ => RetryClass::Never,
        }
    }

    /// Shorthand for `retry_class() == RetryClass::WithBackoff`.
    pub fn is_transient(&self) -> bool {
        self.retry_class() == RetryClass::WithBackoff
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // Signed venue requests carry the signature and timestamp in the query
        // string; never let them reach logs or the user-facing error list.
        let msg = redact_query(&e.to_string());
        if e.is_timeout() {
            CoreError::Timeout(msg)
        } else if e.is_decode() {
            CoreError::Deserialization(msg)
        } else {
            CoreError::Network(msg)
        }
    }
}

/// Strip everything after the first `?` of a message that may embed a URL.
pub fn redact_query(msg: &str) -> String {
    match msg.find('?') {
        Some(idx) => format!("{}?<query redacted>", &msg[..idx]),
        None => msg.to_string(),
    }
}
