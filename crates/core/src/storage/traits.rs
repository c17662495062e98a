use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::credentials::UserCredentials;
use crate::models::manual::ManualEntry;
use crate::models::snapshot::PortfolioSnapshot;

/// Read-only access to a user's exchange API keys. Persisting and
/// encrypting them is the store's business.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Unknown users have no credentials; that is not an error.
    async fn get_credentials(&self, user_id: &str) -> Result<UserCredentials, CoreError>;
}

/// User-entered holdings.
#[async_trait]
pub trait ManualHoldingStore: Send + Sync {
    async fn list_entries(&self, user_id: &str) -> Result<Vec<ManualEntry>, CoreError>;

    /// Validates `entry` before storing it.
    async fn add_entry(&self, user_id: &str, entry: ManualEntry) -> Result<(), CoreError>;
}

/// Append-only per-user snapshot series. There is no update or delete.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Rejects a snapshot whose timestamp is not after the user's latest.
    async fn append(&self, snapshot: PortfolioSnapshot) -> Result<(), CoreError>;

    /// Snapshots with `from <= timestamp <= to` (open bounds when `None`),
    /// ascending by timestamp.
    async fn list_range(
        &self,
        user_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<PortfolioSnapshot>, CoreError>;

    async fn latest(&self, user_id: &str) -> Result<Option<PortfolioSnapshot>, CoreError>;
}

/// Every user a scheduled snapshot run should visit.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self) -> Result<Vec<String>, CoreError>;
}

/// The external collaborators one tracker instance talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialStore>,
    pub manual_holdings: Arc<dyn ManualHoldingStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub users: Arc<dyn UserDirectory>,
}
