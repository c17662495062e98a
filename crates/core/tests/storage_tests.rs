// ═══════════════════════════════════════════════════════════════════
// Storage Tests: PFSN file format, snapshot series, file and
// in-memory stores
// ═══════════════════════════════════════════════════════════════════

use chrono::{DateTime, Duration, Utc};
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, BTreeSet};

use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::credentials::{ExchangeCredentials, UserCredentials};
use portfolio_tracker_core::models::manual::ManualEntry;
use portfolio_tracker_core::models::snapshot::{PortfolioSnapshot, SnapshotKind};
use portfolio_tracker_core::models::source::HoldingSource;
use portfolio_tracker_core::storage::file::{decode_series, encode_series, FileSnapshotStore};
use portfolio_tracker_core::storage::format::{self, CURRENT_VERSION, HEADER_SIZE, MAGIC};
use portfolio_tracker_core::storage::memory::{
    InMemoryCredentialStore, InMemoryManualHoldingStore, InMemorySnapshotStore, SnapshotSeries,
    StaticUserDirectory,
};
use portfolio_tracker_core::storage::traits::{
    CredentialStore, ManualHoldingStore, SnapshotStore, UserDirectory,
};

fn snapshot(user: &str, timestamp: DateTime<Utc>, total: rust_decimal::Decimal) -> PortfolioSnapshot {
    PortfolioSnapshot {
        id: uuid::Uuid::new_v4(),
        user_id: user.to_string(),
        timestamp,
        total_value: total,
        coin_values: BTreeMap::from([("ETH".to_string(), total)]),
        active_sources: BTreeSet::from([HoldingSource::Manual, HoldingSource::Bybit]),
        kind: SnapshotKind::Frequent,
    }
}

// ═══════════════════════════════════════════════════════════════════
// File format
// ═══════════════════════════════════════════════════════════════════

mod file_format {
    use super::*;

    #[test]
    fn header_layout() {
        let bytes = format::write_file(CURRENT_VERSION, b"abc");
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), CURRENT_VERSION);
        assert_eq!(bytes.len(), HEADER_SIZE + 3);

        let (header, payload) = format::read_file(&bytes).unwrap();
        assert_eq!(header.version, CURRENT_VERSION);
        assert_eq!(header.payload_len, 3);
        assert_eq!(payload, b"abc");
    }

    #[test]
    fn too_small() {
        let err = format::read_file(b"PFSN").unwrap_err();
        assert!(matches!(err, CoreError::InvalidFileFormat(_)));
    }

    #[test]
    fn wrong_magic() {
        let mut bytes = format::write_file(CURRENT_VERSION, b"abc");
        bytes[0] = b'X';
        assert!(matches!(
            format::read_file(&bytes),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }

    #[test]
    fn future_version_rejected() {
        let bytes = format::write_file(CURRENT_VERSION + 1, b"abc");
        assert!(matches!(
            format::read_file(&bytes),
            Err(CoreError::UnsupportedVersion(v)) if v == CURRENT_VERSION + 1
        ));
        let bytes = format::write_file(0, b"abc");
        assert!(matches!(
            format::read_file(&bytes),
            Err(CoreError::UnsupportedVersion(0))
        ));
    }

    #[test]
    fn truncated_payload() {
        let mut bytes = format::write_file(CURRENT_VERSION, b"abcdef");
        bytes.truncate(bytes.len() - 2);
        let err = format::read_file(&bytes).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn series_survives_encoding() {
        let mut series = SnapshotSeries::default();
        let t0 = Utc::now();
        series.push(snapshot("alice", t0, dec!(1234.5678))).unwrap();
        series.push(snapshot("bob", t0, dec!(10))).unwrap();

        let decoded = decode_series(&encode_series(&series).unwrap()).unwrap();
        assert_eq!(decoded, series);
    }

    #[test]
    fn garbage_payload_is_deserialization_error() {
        let bytes = format::write_file(CURRENT_VERSION, &[0xff, 0x01]);
        assert!(matches!(
            decode_series(&bytes),
            Err(CoreError::Deserialization(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Snapshot series
// ═══════════════════════════════════════════════════════════════════

mod snapshot_series {
    use super::*;

    #[test]
    fn rejects_non_increasing_timestamps() {
        let mut series = SnapshotSeries::default();
        let t0 = Utc::now();
        series.push(snapshot("alice", t0, dec!(1))).unwrap();

        let err = series.push(snapshot("alice", t0, dec!(2))).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert!(series
            .push(snapshot("alice", t0 - Duration::seconds(1), dec!(2)))
            .is_err());
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn users_are_independent() {
        let mut series = SnapshotSeries::default();
        let t0 = Utc::now();
        series.push(snapshot("alice", t0, dec!(1))).unwrap();
        series.push(snapshot("bob", t0 - Duration::hours(1), dec!(1))).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let mut series = SnapshotSeries::default();
        let t0 = Utc::now() - Duration::hours(3);
        for i in 0..3 {
            series
                .push(snapshot("alice", t0 + Duration::hours(i), dec!(1)))
                .unwrap();
        }
        let mid = series.range("alice", Some(t0 + Duration::hours(1)), Some(t0 + Duration::hours(2)));
        assert_eq!(mid.len(), 2);
        assert!(mid[0].timestamp < mid[1].timestamp);
        assert_eq!(series.range("alice", None, None).len(), 3);
        assert!(series.range("nobody", None, None).is_empty());
        assert_eq!(series.latest("alice").unwrap().timestamp, t0 + Duration::hours(2));
    }
}

// ═══════════════════════════════════════════════════════════════════
// FileSnapshotStore
// ═══════════════════════════════════════════════════════════════════

mod file_store {
    use super::*;

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path().join("snapshots.pfsn"))
            .await
            .unwrap();
        assert!(store.latest("alice").await.unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn appends_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.pfsn");
        let t0 = Utc::now() - Duration::minutes(10);

        {
            let store = FileSnapshotStore::open(&path).await.unwrap();
            store.append(snapshot("alice", t0, dec!(100))).await.unwrap();
            store
                .append(snapshot("alice", t0 + Duration::minutes(5), dec!(110)))
                .await
                .unwrap();
        }

        let reopened = FileSnapshotStore::open(&path).await.unwrap();
        let series = reopened.list_range("alice", None, None).await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].total_value, dec!(110));
        assert_eq!(
            series[0].active_sources,
            BTreeSet::from([HoldingSource::Bybit, HoldingSource::Manual])
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn rejected_append_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.pfsn");
        let t0 = Utc::now();

        let store = FileSnapshotStore::open(&path).await.unwrap();
        store.append(snapshot("alice", t0, dec!(100))).await.unwrap();
        let before = std::fs::read(&path).unwrap();

        assert!(store.append(snapshot("alice", t0, dec!(200))).await.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(store.list_range("alice", None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.pfsn");
        std::fs::write(&path, b"definitely not a snapshot file").unwrap();
        assert!(matches!(
            FileSnapshotStore::open(&path).await,
            Err(CoreError::InvalidFileFormat(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// In-memory collaborators
// ═══════════════════════════════════════════════════════════════════

mod in_memory {
    use super::*;

    #[tokio::test]
    async fn unknown_user_has_no_credentials() {
        let store = InMemoryCredentialStore::new();
        let creds = store.get_credentials("alice").await.unwrap();
        assert_eq!(creds, UserCredentials::default());
    }

    #[tokio::test]
    async fn credentials_set_and_removed() {
        let store = InMemoryCredentialStore::new();
        store.set_credentials(
            "alice",
            UserCredentials {
                binance: None,
                bybit: Some(ExchangeCredentials::new("k", "s")),
            },
        );
        assert!(store.get_credentials("alice").await.unwrap().has_any());
        store.remove_credentials("alice");
        assert!(!store.get_credentials("alice").await.unwrap().has_any());
    }

    #[tokio::test]
    async fn manual_store_validates_and_lists_per_user() {
        let store = InMemoryManualHoldingStore::new();
        store
            .add_entry("alice", ManualEntry::new("ETH", dec!(1), dec!(2000)))
            .await
            .unwrap();
        assert!(store
            .add_entry("alice", ManualEntry::new("ETH", dec!(0), dec!(2000)))
            .await
            .is_err());

        assert_eq!(store.list_entries("alice").await.unwrap().len(), 1);
        assert!(store.list_entries("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_store_tracks_latest() {
        let store = InMemorySnapshotStore::new();
        let t0 = Utc::now();
        store.append(snapshot("alice", t0, dec!(1))).await.unwrap();
        store
            .append(snapshot("alice", t0 + Duration::seconds(1), dec!(2)))
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.latest("alice").await.unwrap().unwrap().total_value, dec!(2));
    }

    #[tokio::test]
    async fn static_directory_lists_users() {
        let users = StaticUserDirectory::new(["alice", "bob"]);
        assert_eq!(users.list_users().await.unwrap(), vec!["alice", "bob"]);
    }
}
