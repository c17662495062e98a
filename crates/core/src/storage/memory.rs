use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::{CredentialStore, ManualHoldingStore, SnapshotStore, UserDirectory};
use crate::errors::CoreError;
use crate::models::credentials::UserCredentials;
use crate::models::manual::ManualEntry;
use crate::models::snapshot::PortfolioSnapshot;

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<String, UserCredentials>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_credentials(&self, user_id: &str, credentials: UserCredentials) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.insert(user_id.to_string(), credentials);
    }

    pub fn remove_credentials(&self, user_id: &str) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.remove(user_id);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_credentials(&self, user_id: &str) -> Result<UserCredentials, CoreError> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        Ok(users.get(user_id).cloned().unwrap_or_default())
    }
}

/// Process-local manual holdings, kept in insertion order per user.
#[derive(Debug, Default)]
pub struct InMemoryManualHoldingStore {
    entries: RwLock<HashMap<String, Vec<ManualEntry>>>,
}

impl InMemoryManualHoldingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ManualHoldingStore for InMemoryManualHoldingStore {
    async fn list_entries(&self, user_id: &str) -> Result<Vec<ManualEntry>, CoreError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(user_id).cloned().unwrap_or_default())
    }

    async fn add_entry(&self, user_id: &str, entry: ManualEntry) -> Result<(), CoreError> {
        entry.validate()?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.entry(user_id.to_string()).or_default().push(entry);
        Ok(())
    }
}

/// Per-user snapshot series with the append-only, strictly-increasing
/// timestamp rule. Shared by the in-memory and file-backed stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSeries {
    by_user: HashMap<String, Vec<PortfolioSnapshot>>,
}

impl SnapshotSeries {
    pub fn push(&mut self, snapshot: PortfolioSnapshot) -> Result<(), CoreError> {
        let series = self.by_user.entry(snapshot.user_id.clone()).or_default();
        if let Some(last) = series.last() {
            if snapshot.timestamp <= last.timestamp {
                return Err(CoreError::Storage(format!(
                    "Snapshot for {} at {} is not after the latest ({})",
                    snapshot.user_id, snapshot.timestamp, last.timestamp
                )));
            }
        }
        series.push(snapshot);
        Ok(())
    }

    pub fn range(
        &self,
        user_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<PortfolioSnapshot> {
        self.by_user
            .get(user_id)
            .map(|series| {
                series
                    .iter()
                    .filter(|s| from.is_none_or(|f| s.timestamp >= f))
                    .filter(|s| to.is_none_or(|t| s.timestamp <= t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn latest(&self, user_id: &str) -> Option<PortfolioSnapshot> {
        self.by_user.get(user_id).and_then(|s| s.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.by_user.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    series: RwLock<SnapshotSeries>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total snapshots across all users.
    pub fn len(&self) -> usize {
        self.series.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn append(&self, snapshot: PortfolioSnapshot) -> Result<(), CoreError> {
        let mut series = self.series.write().unwrap_or_else(|e| e.into_inner());
        series.push(snapshot)
    }

    async fn list_range(
        &self,
        user_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<PortfolioSnapshot>, CoreError> {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        Ok(series.range(user_id, from, to))
    }

    async fn latest(&self, user_id: &str) -> Result<Option<PortfolioSnapshot>, CoreError> {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        Ok(series.latest(user_id))
    }
}

/// Fixed list of users.
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    users: Vec<String>,
}

impl StaticUserDirectory {
    pub fn new(users: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn list_users(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.users.clone())
    }
}
