mod error;
mod inventory;
mod writer;

pub use error::StoreError;
pub use inventory::Inventory;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::limits::MAX_BATCH_SIZE;
use crate::model::*;
use crate::wal::Wal;

use writer::{wal_writer_loop, WalCommand};

/// Read side of the property data that the search engine depends on.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn room_types(&self) -> Result<Vec<RoomType>, StoreError>;

    async fn rooms(&self) -> Result<Vec<Room>, StoreError>;

    /// Every reservation whose stay overlaps `window`, binding or not.
    async fn reservations_overlapping(
        &self,
        window: &StayWindow,
    ) -> Result<Vec<Reservation>, StoreError>;
}

#[async_trait]
impl Repository for Inventory {
    async fn room_types(&self) -> Result<Vec<RoomType>, StoreError> {
        Ok(Inventory::room_types(self).cloned().collect())
    }

    async fn rooms(&self) -> Result<Vec<Room>, StoreError> {
        Ok(Inventory::rooms(self).cloned().collect())
    }

    async fn reservations_overlapping(
        &self,
        window: &StayWindow,
    ) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.overlapping(window).cloned().collect())
    }
}

/// One property's inventory, held in memory and made durable through its WAL.
///
/// Readers take `snapshot()` and get an `Arc<Inventory>` that never changes
/// under them. Writers serialize on the lock, append to the WAL, then apply
/// copy-on-write.
pub struct InMemoryStore {
    current: RwLock<Arc<Inventory>>,
    /// `None` for an ephemeral store with no durability.
    wal_tx: Option<mpsc::Sender<WalCommand>>,
    wal_path: Option<PathBuf>,
}

impl InMemoryStore {
    /// Replay the WAL at `wal_path` and start its writer task.
    /// Must be called from inside a tokio runtime.
    pub fn open(wal_path: &Path) -> std::io::Result<Self> {
        let events = Wal::recover(wal_path)?;
        let mut inventory = Inventory::default();
        for event in &events {
            inventory.apply(event);
        }
        tracing::debug!("replayed {} events from {}", events.len(), wal_path.display());

        let wal = Wal::open(wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(1024);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            current: RwLock::new(Arc::new(inventory)),
            wal_tx: Some(wal_tx),
            wal_path: Some(wal_path.to_path_buf()),
        })
    }

    /// A store that lives only in memory.
    pub fn ephemeral() -> Self {
        Self {
            current: RwLock::new(Arc::new(Inventory::default())),
            wal_tx: None,
            wal_path: None,
        }
    }

    pub fn wal_path(&self) -> Option<&Path> {
        self.wal_path.as_deref()
    }

    /// Consistent view of the whole property for one search.
    pub async fn snapshot(&self) -> Arc<Inventory> {
        self.current.read().await.clone()
    }

    async fn wal_append(&self, events: Vec<Event>) -> Result<(), StoreError> {
        let Some(tx) = &self.wal_tx else {
            return Ok(());
        };
        let (response, rx) = oneshot::channel();
        tx.send(WalCommand::Append { events, response })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }

    /// Validate under the write lock, persist, then apply.
    async fn commit<F>(&self, prepare: F) -> Result<Event, StoreError>
    where
        F: FnOnce(&Inventory) -> Result<Event, StoreError>,
    {
        let mut guard = self.current.write().await;
        let event = prepare(&guard)?;
        self.wal_append(vec![event.clone()]).await?;
        Arc::make_mut(&mut guard).apply(&event);
        Ok(event)
    }

    pub async fn add_room_type(&self, new: NewRoomType) -> Result<RoomTypeId, StoreError> {
        match self.commit(|inv| inv.prepare_room_type(new)).await? {
            Event::RoomTypeAdded { id, .. } => Ok(id),
            _ => unreachable!("prepare_room_type yields RoomTypeAdded"),
        }
    }

    pub async fn add_room(&self, new: NewRoom) -> Result<RoomId, StoreError> {
        match self.commit(|inv| inv.prepare_room(new)).await? {
            Event::RoomAdded { id, .. } => Ok(id),
            _ => unreachable!("prepare_room yields RoomAdded"),
        }
    }

    pub async fn set_room_status(&self, id: RoomId, status: RoomStatus) -> Result<(), StoreError> {
        self.commit(|inv| inv.prepare_room_status(id, status)).await?;
        Ok(())
    }

    pub async fn add_guest(&self, new: NewGuest) -> Result<GuestId, StoreError> {
        match self.commit(|inv| inv.prepare_guest(new)).await? {
            Event::GuestAdded { id, .. } => Ok(id),
            _ => unreachable!("prepare_guest yields GuestAdded"),
        }
    }

    /// Store a reservation record as-is. No availability check: this loads
    /// history and external bookings, it does not take bookings.
    pub async fn record_reservation(&self, new: NewReservation) -> Result<ReservationId, StoreError> {
        let ids = self.record_reservations(vec![new]).await?;
        Ok(ids[0])
    }

    /// All-or-nothing batch load.
    pub async fn record_reservations(
        &self,
        batch: Vec<NewReservation>,
    ) -> Result<Vec<ReservationId>, StoreError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        if batch.len() > MAX_BATCH_SIZE {
            return Err(StoreError::LimitExceeded("batch too large"));
        }
        let mut guard = self.current.write().await;
        let now = Utc::now();
        let mut pending = BTreeSet::new();
        let mut events = Vec::with_capacity(batch.len());
        for new in batch {
            let event = guard.prepare_reservation(new, &pending, now)?;
            if let Event::ReservationRecorded { id, .. } = &event {
                pending.insert(*id);
            }
            events.push(event);
        }
        self.wal_append(events.clone()).await?;
        let inv = Arc::make_mut(&mut guard);
        let mut ids = Vec::with_capacity(events.len());
        for event in &events {
            inv.apply(event);
            if let Event::ReservationRecorded { id, .. } = event {
                ids.push(*id);
            }
        }
        Ok(ids)
    }

    pub async fn issue_invoice(&self, new: NewInvoice) -> Result<InvoiceId, StoreError> {
        let now = Utc::now();
        match self.commit(|inv| inv.prepare_invoice(new, now)).await? {
            Event::InvoiceIssued { id, .. } => Ok(id),
            _ => unreachable!("prepare_invoice yields InvoiceIssued"),
        }
    }

    // ── Compaction ───────────────────────────────────────────

    pub async fn appends_since_compact(&self) -> u64 {
        let Some(tx) = &self.wal_tx else {
            return 0;
        };
        let (response, rx) = oneshot::channel();
        if tx.send(WalCommand::AppendsSinceCompact { response }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Rewrite the WAL as the minimal event list for the current state.
    /// Writers are held off until the swap completes so nothing lands in the old file.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let Some(tx) = &self.wal_tx else {
            return Ok(());
        };
        let guard = self.current.write().await;
        let events = guard.to_events();
        let (response, rx) = oneshot::channel();
        tx.send(WalCommand::Compact { events, response })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))?;
        drop(guard);
        Ok(())
    }
}

/// Each call reads whatever is current. For a consistent multi-call read, use `snapshot()`.
#[async_trait]
impl Repository for InMemoryStore {
    async fn room_types(&self) -> Result<Vec<RoomType>, StoreError> {
        Repository::room_types(self.snapshot().await.as_ref()).await
    }

    async fn rooms(&self) -> Result<Vec<Room>, StoreError> {
        Repository::rooms(self.snapshot().await.as_ref()).await
    }

    async fn reservations_overlapping(
        &self,
        window: &StayWindow,
    ) -> Result<Vec<Reservation>, StoreError> {
        self.snapshot().await.reservations_overlapping(window).await
    }
}
