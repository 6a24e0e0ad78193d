use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::store::{InMemoryStore, StoreError};

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Rewrite the WAL when at least `threshold` appends have landed since the last rewrite.
/// Returns whether a compaction ran.
pub async fn compact_if_due(store: &InMemoryStore, threshold: u64) -> Result<bool, StoreError> {
    let appends = store.appends_since_compact().await;
    if appends < threshold.max(1) {
        return Ok(false);
    }
    store.compact().await?;
    info!(
        "compacted {} after {appends} appends",
        store
            .wal_path()
            .map_or_else(|| "<ephemeral>".to_string(), |p| p.display().to_string())
    );
    Ok(true)
}

/// Background task that periodically compacts one property's WAL.
pub async fn run_compactor(store: Arc<InMemoryStore>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&store, threshold).await {
            warn!("compaction failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::wal::Wal;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("vacancy_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn room_type(name: &str) -> NewRoomType {
        NewRoomType {
            id: None,
            name: name.into(),
            description: None,
            capacity: 2,
            price_per_night: 100.0,
        }
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_wal_path("threshold.wal");
        let store = InMemoryStore::open(&path).unwrap();
        let rt = store.add_room_type(room_type("Standard")).await.unwrap();
        let room = store
            .add_room(NewRoom {
                id: None,
                room_number: "101".into(),
                room_type_id: rt,
                status: RoomStatus::Available,
                floor: None,
            })
            .await
            .unwrap();

        assert!(!compact_if_due(&store, 10).await.unwrap());

        // Status flips collapse into the room's current status.
        for _ in 0..4 {
            store.set_room_status(room, RoomStatus::Maintenance).await.unwrap();
            store.set_room_status(room, RoomStatus::Available).await.unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap().len(), 10);

        assert!(compact_if_due(&store, 10).await.unwrap());
        assert_eq!(store.appends_since_compact().await, 0);
        assert_eq!(Wal::replay(&path).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ephemeral_store_never_compacts() {
        let store = InMemoryStore::ephemeral();
        store.add_room_type(room_type("Standard")).await.unwrap();
        assert!(!compact_if_due(&store, 1).await.unwrap());
    }
}
