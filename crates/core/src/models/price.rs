use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Outcome of resolving one coin: a positive price or the reason it failed.
pub type PriceOutcome = Result<Decimal, String>;

/// Per-cycle price cache keyed by lookup (`"BTC@Binance"`).
///
/// The first caller for a key runs the resolution; concurrent callers for
/// the same key wait on the same cell instead of issuing their own request.
/// Failures are cached too, so a lookup that failed is not retried again
/// within the cycle.
///
/// Lives only as long as one fetch cycle; never shared between users.
#[derive(Debug, Default)]
pub struct CyclePriceCache {
    cells: Mutex<HashMap<String, Arc<OnceCell<PriceOutcome>>>>,
}

impl CyclePriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached outcome for `key`, running `resolve` if no caller has yet.
    pub async fn get_or_resolve<F, Fut>(&self, key: &str, resolve: F) -> PriceOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PriceOutcome>,
    {
        let cell = {
            let mut cells = self.cells.lock().await;
            cells.entry(key.to_string()).or_default().clone()
        };
        cell.get_or_init(resolve).await.clone()
    }

    /// Already-settled outcome for `key`, if any.
    pub async fn peek(&self, key: &str) -> Option<PriceOutcome> {
        let cells = self.cells.lock().await;
        cells.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Number of keys with a settled outcome.
    pub async fn len(&self) -> usize {
        let cells = self.cells.lock().await;
        cells.values().filter(|cell| cell.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
