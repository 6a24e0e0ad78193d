use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type RoomTypeId = i64;
pub type RoomId = i64;
pub type GuestId = i64;
pub type ReservationId = i64;
pub type InvoiceId = i64;

/// Half-open stay `[check_in, check_out)` in calendar days.
///
/// A guest departing on day D does not block a guest arriving on day D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayWindow {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayWindow {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "StayWindow check_in must be before check_out");
        Self { check_in, check_out }
    }

    /// Checked constructor for untrusted input. `None` for zero or negative stays.
    pub fn try_new(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_in < check_out).then_some(Self { check_in, check_out })
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &StayWindow) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

impl fmt::Display for StayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

// ── Statuses ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    /// Informational only; availability is decided by reservation overlap.
    Occupied,
    /// Never offerable, whatever the reservations say.
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Maintenance => "maintenance",
        }
    }
}

impl FromStr for RoomStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(RoomStatus::Available),
            "occupied" => Ok(RoomStatus::Occupied),
            "maintenance" => Ok(RoomStatus::Maintenance),
            other => Err(format!("unknown room status: {other}")),
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl ReservationStatus {
    /// Binding reservations occupy their room for the whole stay.
    pub fn is_binding(&self) -> bool {
        matches!(self, ReservationStatus::Confirmed | ReservationStatus::CheckedIn)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::CheckedIn => "checked_in",
            ReservationStatus::CheckedOut => "checked_out",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "checked_in" => Ok(ReservationStatus::CheckedIn),
            "checked_out" => Ok(ReservationStatus::CheckedOut),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Entities ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    pub id: GuestId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A bookable category: every room of a type shares its price and capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: RoomTypeId,
    pub name: String,
    pub description: Option<String>,
    /// Max occupants.
    pub capacity: u32,
    pub price_per_night: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub room_number: String,
    pub room_type_id: RoomTypeId,
    pub status: RoomStatus,
    pub floor: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub guest_id: GuestId,
    pub room_id: RoomId,
    pub stay: StayWindow,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Does this reservation keep its room from being offered for `window`?
    pub fn blocks(&self, window: &StayWindow) -> bool {
        self.status.is_binding() && self.stay.overlaps(window)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub reservation_id: ReservationId,
    pub total_amount: f64,
    pub issued_at: DateTime<Utc>,
}

// ── Load records (ids optional, assigned by the store) ───────────

#[derive(Debug, Clone, PartialEq)]
pub struct NewRoomType {
    pub id: Option<RoomTypeId>,
    pub name: String,
    pub description: Option<String>,
    pub capacity: u32,
    pub price_per_night: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    pub id: Option<RoomId>,
    pub room_number: String,
    pub room_type_id: RoomTypeId,
    pub status: RoomStatus,
    pub floor: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGuest {
    pub id: Option<GuestId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub id: Option<ReservationId>,
    pub guest_id: GuestId,
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub id: Option<InvoiceId>,
    pub reservation_id: ReservationId,
    pub total_amount: f64,
}

/// Flat event records. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    RoomTypeAdded {
        id: RoomTypeId,
        name: String,
        description: Option<String>,
        capacity: u32,
        price_per_night: f64,
    },
    RoomAdded {
        id: RoomId,
        room_number: String,
        room_type_id: RoomTypeId,
        status: RoomStatus,
        floor: Option<i32>,
    },
    RoomStatusChanged {
        id: RoomId,
        status: RoomStatus,
    },
    GuestAdded {
        id: GuestId,
        first_name: String,
        last_name: String,
        email: String,
        phone: Option<String>,
    },
    ReservationRecorded {
        id: ReservationId,
        guest_id: GuestId,
        room_id: RoomId,
        stay: StayWindow,
        status: ReservationStatus,
        created_at: DateTime<Utc>,
    },
    InvoiceIssued {
        id: InvoiceId,
        reservation_id: ReservationId,
        total_amount: f64,
        issued_at: DateTime<Utc>,
    },
}

// ── Search contract ──────────────────────────────────────────────

/// Raw search input as collected by a presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "checkInDate")]
    pub check_in: NaiveDate,
    #[serde(rename = "checkOutDate")]
    pub check_out: NaiveDate,
    #[serde(rename = "guestCount")]
    pub guest_count: i64,
}

/// One row of a successful search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableRoomType {
    pub id: RoomTypeId,
    pub name: String,
    pub description: Option<String>,
    pub capacity: u32,
    pub price_per_night: f64,
}

impl From<&RoomType> for AvailableRoomType {
    fn from(rt: &RoomType) -> Self {
        Self {
            id: rt.id,
            name: rt.name.clone(),
            description: rt.description.clone(),
            capacity: rt.capacity,
            price_per_night: rt.price_per_night,
        }
    }
}
