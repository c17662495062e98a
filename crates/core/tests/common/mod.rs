// ═══════════════════════════════════════════════════════════════════
// Shared test helpers: scripted HTTP transport, fixtures
// ═══════════════════════════════════════════════════════════════════
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::settings::Settings;
use portfolio_tracker_core::net::transport::{HttpRequest, HttpResponse, HttpTransport};
use portfolio_tracker_core::storage::memory::{
    InMemoryCredentialStore, InMemoryManualHoldingStore, InMemorySnapshotStore,
    StaticUserDirectory,
};
use portfolio_tracker_core::storage::traits::Collaborators;

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, CoreError> + Send + Sync>;

/// Transport that answers from a route table and records every request.
///
/// A route matches when its fragment appears in the request URL; the first
/// matching route wins. Unmatched requests get a 404.
pub struct ScriptedTransport {
    routes: Vec<(String, Handler)>,
    log: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn route<F>(mut self, fragment: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, CoreError> + Send + Sync + 'static,
    {
        self.routes.push((fragment.to_string(), Box::new(handler)));
        self
    }

    /// Fixed response for every request matching `fragment`.
    pub fn respond(self, fragment: &str, status: u16, body: &str) -> Self {
        let body = body.to_string();
        self.route(fragment, move |_| Ok(HttpResponse::new(status, body.clone())))
    }

    /// Every request matching `fragment` fails with the error `make` builds.
    pub fn fail(self, fragment: &str, make: fn() -> CoreError) -> Self {
        self.route(fragment, move |_| Err(make()))
    }

    /// Binance ticker for `pair` at `price`.
    pub fn binance_price(self, pair: &str, price: &str) -> Self {
        let fragment = format!("/api/v3/ticker/price?symbol={pair}");
        let body = format!(r#"{{"symbol":"{pair}","price":"{price}"}}"#);
        self.respond(&fragment, 200, &body)
    }

    /// Bybit spot ticker for `pair` at `price`.
    pub fn bybit_price(self, pair: &str, price: &str) -> Self {
        let fragment = format!("/v5/market/tickers?category=spot&symbol={pair}");
        let body = format!(
            r#"{{"retCode":0,"retMsg":"OK","result":{{"category":"spot","list":[{{"symbol":"{pair}","lastPrice":"{price}"}}]}}}}"#
        );
        self.respond(&fragment, 200, &body)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Requests whose URL contains `fragment`.
    pub fn calls_to(&self, fragment: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, CoreError> {
        self.log.lock().unwrap().push(request.clone());
        for (fragment, handler) in &self.routes {
            if request.url.contains(fragment.as_str()) {
                return handler(&request);
            }
        }
        Ok(HttpResponse::new(404, "not found"))
    }
}

pub fn timeout_error() -> CoreError {
    CoreError::Timeout("operation timed out".into())
}

/// Defaults with zero backoff and a short Bybit coin list.
pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry.base_delay_ms = 0;
    settings.bybit_tracked_coins = vec!["USDT".into(), "BTC".into(), "ETH".into()];
    settings.bybit_account_types = vec!["UNIFIED".into()];
    settings
}

/// In-memory collaborators plus typed handles to seed them.
pub struct Stores {
    pub credentials: Arc<InMemoryCredentialStore>,
    pub manual: Arc<InMemoryManualHoldingStore>,
    pub snapshots: Arc<InMemorySnapshotStore>,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            credentials: Arc::new(InMemoryCredentialStore::new()),
            manual: Arc::new(InMemoryManualHoldingStore::new()),
            snapshots: Arc::new(InMemorySnapshotStore::new()),
        }
    }

    pub fn collaborators(&self, users: &[&str]) -> Collaborators {
        Collaborators {
            credentials: self.credentials.clone(),
            manual_holdings: self.manual.clone(),
            snapshots: self.snapshots.clone(),
            users: Arc::new(StaticUserDirectory::new(users.iter().copied())),
        }
    }
}
