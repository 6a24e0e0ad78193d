//! Demo property: a small hotel with a few weeks of history around "today".
//!
//! Reservation dates in the fixture are day offsets, resolved against the
//! date passed to [`load`] so the demo always has past, current and upcoming stays.

use chrono::{NaiveDate, TimeDelta};
use serde::Deserialize;
use tracing::info;

use crate::model::*;
use crate::store::{InMemoryStore, StoreError};

const DEMO_PROPERTY: &str = include_str!("../fixtures/demo_property.json");

#[derive(Debug, Clone, Deserialize)]
pub struct DemoFixture {
    pub room_types: Vec<FixtureRoomType>,
    pub rooms: Vec<FixtureRoom>,
    pub guests: Vec<FixtureGuest>,
    pub reservations: Vec<FixtureReservation>,
    pub invoices: Vec<FixtureInvoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRoomType {
    pub id: RoomTypeId,
    pub name: String,
    pub description: Option<String>,
    pub capacity: u32,
    pub price_per_night: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRoom {
    pub id: RoomId,
    pub room_number: String,
    pub room_type_id: RoomTypeId,
    pub floor: Option<i32>,
    pub status: RoomStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureGuest {
    pub id: GuestId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// `check_in` / `check_out` are days relative to the load date.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureReservation {
    pub id: ReservationId,
    pub guest_id: GuestId,
    pub room_id: RoomId,
    pub check_in: i64,
    pub check_out: i64,
    pub status: ReservationStatus,
}

/// The amount is derived on load: nights times the room type's nightly price.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureInvoice {
    pub id: InvoiceId,
    pub reservation_id: ReservationId,
}

/// Entity counts written by [`load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub room_types: usize,
    pub rooms: usize,
    pub guests: usize,
    pub reservations: usize,
    pub invoices: usize,
}

pub fn demo_fixture() -> Result<DemoFixture, serde_json::Error> {
    serde_json::from_str(DEMO_PROPERTY)
}

fn offset(today: NaiveDate, days: i64) -> Result<NaiveDate, StoreError> {
    today
        .checked_add_signed(TimeDelta::days(days))
        .ok_or_else(|| StoreError::Invalid(format!("day offset {days} from {today} out of range")))
}

/// Load the demo fixture into an empty store.
pub async fn load(store: &InMemoryStore, today: NaiveDate) -> Result<SeedSummary, StoreError> {
    let fixture = demo_fixture().map_err(|e| StoreError::Invalid(format!("demo fixture: {e}")))?;
    load_fixture(store, fixture, today).await
}

pub async fn load_fixture(
    store: &InMemoryStore,
    fixture: DemoFixture,
    today: NaiveDate,
) -> Result<SeedSummary, StoreError> {
    if !store.snapshot().await.is_empty() {
        return Err(StoreError::Invalid("property already holds data".into()));
    }
    let mut summary = SeedSummary::default();

    for rt in fixture.room_types {
        store
            .add_room_type(NewRoomType {
                id: Some(rt.id),
                name: rt.name,
                description: rt.description,
                capacity: rt.capacity,
                price_per_night: rt.price_per_night,
            })
            .await?;
        summary.room_types += 1;
    }

    for room in fixture.rooms {
        store
            .add_room(NewRoom {
                id: Some(room.id),
                room_number: room.room_number,
                room_type_id: room.room_type_id,
                status: room.status,
                floor: room.floor,
            })
            .await?;
        summary.rooms += 1;
    }

    for guest in fixture.guests {
        store
            .add_guest(NewGuest {
                id: Some(guest.id),
                first_name: guest.first_name,
                last_name: guest.last_name,
                email: guest.email,
                phone: guest.phone,
            })
            .await?;
        summary.guests += 1;
    }

    let batch = fixture
        .reservations
        .into_iter()
        .map(|r| {
            Ok(NewReservation {
                id: Some(r.id),
                guest_id: r.guest_id,
                room_id: r.room_id,
                check_in: offset(today, r.check_in)?,
                check_out: offset(today, r.check_out)?,
                status: r.status,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;
    summary.reservations = store.record_reservations(batch).await?.len();

    let snapshot = store.snapshot().await;
    for invoice in fixture.invoices {
        let total_amount = stay_total(&snapshot, invoice.reservation_id)?;
        store
            .issue_invoice(NewInvoice {
                id: Some(invoice.id),
                reservation_id: invoice.reservation_id,
                total_amount,
            })
            .await?;
        summary.invoices += 1;
    }

    info!(
        "seeded demo property: {} room types, {} rooms, {} guests, {} reservations, {} invoices",
        summary.room_types, summary.rooms, summary.guests, summary.reservations, summary.invoices
    );
    Ok(summary)
}

fn stay_total(inventory: &crate::store::Inventory, id: ReservationId) -> Result<f64, StoreError> {
    let reservation = inventory.reservation(id).ok_or(StoreError::MissingReference {
        entity: "reservation",
        id,
    })?;
    let price = inventory
        .room(reservation.room_id)
        .and_then(|room| inventory.room_type(room.room_type_id))
        .map(|rt| rt.price_per_night)
        .ok_or(StoreError::MissingReference {
            entity: "room",
            id: reservation.room_id,
        })?;
    Ok(reservation.stay.nights() as f64 * price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, FixedClock};

    fn today() -> NaiveDate {
        "2026-10-17".parse().unwrap()
    }

    fn day(n: i64) -> NaiveDate {
        offset(today(), n).unwrap()
    }

    #[test]
    fn fixture_parses() {
        let fixture = demo_fixture().unwrap();
        assert_eq!(fixture.room_types.len(), 5);
        assert_eq!(fixture.rooms.len(), 13);
        assert_eq!(fixture.guests.len(), 8);
        assert_eq!(fixture.reservations.len(), 10);
        assert_eq!(fixture.invoices.len(), 2);
        assert!(fixture.rooms.iter().any(|r| r.status == RoomStatus::Maintenance));
    }

    #[tokio::test]
    async fn load_resolves_offsets_and_prices_invoices() {
        let store = InMemoryStore::ephemeral();
        let summary = load(&store, today()).await.unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                room_types: 5,
                rooms: 13,
                guests: 8,
                reservations: 10,
                invoices: 2,
            }
        );

        let snap = store.snapshot().await;
        let first = snap.reservation(1).unwrap();
        assert_eq!(first.stay, StayWindow::new(day(-14), day(-10)));
        assert_eq!(first.status, ReservationStatus::CheckedOut);

        // 4 nights in a Single (89) and 4 nights in a Double (129)
        let totals: Vec<f64> = snap.invoices().map(|i| i.total_amount).collect();
        assert_eq!(totals, vec![356.0, 516.0]);
    }

    #[tokio::test]
    async fn load_refuses_non_empty_store() {
        let store = InMemoryStore::ephemeral();
        load(&store, today()).await.unwrap();
        let err = load(&store, today()).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn demo_search_for_two_tomorrow() {
        let store = InMemoryStore::ephemeral();
        load(&store, today()).await.unwrap();
        let engine = Engine::with_clock(FixedClock(today()));

        let req = SearchRequest {
            check_in: day(1),
            check_out: day(2),
            guest_count: 2,
        };
        let rows = engine.search_available(&store, &req).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Twin Room", "Double Room", "Junior Suite", "Executive Suite"]
        );
    }

    #[tokio::test]
    async fn demo_executive_suite_stays_bookable_while_one_is_reserved() {
        let store = InMemoryStore::ephemeral();
        load(&store, today()).await.unwrap();
        let engine = Engine::with_clock(FixedClock(today()));

        // 401 is reserved for [+10, +14); 402 is marked occupied but its stay ends at +5.
        let req = SearchRequest {
            check_in: day(10),
            check_out: day(12),
            guest_count: 3,
        };
        let rows = engine.search_available(&store, &req).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Executive Suite");
        assert_eq!(rows[0].capacity, 3);
    }
}
