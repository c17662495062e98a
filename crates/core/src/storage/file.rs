use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::format;
use super::memory::SnapshotSeries;
use super::traits::SnapshotStore;
use crate::errors::CoreError;
use crate::models::snapshot::PortfolioSnapshot;

/// Snapshot store persisted to a single PFSN file.
///
/// The whole series is held in memory and the file is rewritten on every
/// append: written to a sibling temp file, then renamed over the original,
/// so a crash mid-write leaves the previous file intact.
pub struct FileSnapshotStore {
    path: PathBuf,
    series: Mutex<SnapshotSeries>,
}

impl FileSnapshotStore {
    /// Open `path`, or start an empty series if it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let series = match tokio::fs::read(&path).await {
            Ok(bytes) => decode_series(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SnapshotSeries::default(),
            Err(e) => return Err(e.into()),
        };
        log::info!(
            "Opened snapshot file {} with {} snapshots",
            path.display(),
            series.len()
        );
        Ok(Self {
            path,
            series: Mutex::new(series),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, series: &SnapshotSeries) -> Result<(), CoreError> {
        let bytes = encode_series(series)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Flow: SnapshotSeries → bincode → PFSN bytes
pub fn encode_series(series: &SnapshotSeries) -> Result<Vec<u8>, CoreError> {
    let payload = bincode::serialize(series)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize snapshots: {e}")))?;
    Ok(format::write_file(format::CURRENT_VERSION, &payload))
}

/// Flow: PFSN bytes → parse header → bincode → SnapshotSeries
pub fn decode_series(data: &[u8]) -> Result<SnapshotSeries, CoreError> {
    let (_, payload) = format::read_file(data)?;
    bincode::deserialize(payload)
        .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize snapshots: {e}")))
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn append(&self, snapshot: PortfolioSnapshot) -> Result<(), CoreError> {
        let mut series = self.series.lock().await;
        // Memory only changes once the file write has succeeded.
        let mut next = series.clone();
        next.push(snapshot)?;
        self.persist(&next).await?;
        *series = next;
        Ok(())
    }

    async fn list_range(
        &self,
        user_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<PortfolioSnapshot>, CoreError> {
        Ok(self.series.lock().await.range(user_id, from, to))
    }

    async fn latest(&self, user_id: &str) -> Result<Option<PortfolioSnapshot>, CoreError> {
        Ok(self.series.lock().await.latest(user_id))
    }
}
