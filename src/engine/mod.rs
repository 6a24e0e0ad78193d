mod availability;
mod conflict;
mod error;
mod validate;

pub use availability::available_room_types;
pub use conflict::unavailable_rooms;
pub use error::{EngineError, Field, FieldError, ValidationErrors};
pub use validate::{
    validate_search, ValidatedSearch, CHECK_IN_IN_PAST, CHECK_IN_TOO_FAR_AHEAD,
    CHECK_OUT_NOT_AFTER_CHECK_IN, GUEST_COUNT_TOO_LOW,
};

use std::time::Instant;

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::model::*;
use crate::observability::{SEARCHES_TOTAL, SEARCH_DURATION_SECONDS, SEARCH_RESULTS};
use crate::store::Repository;

/// Source of "today" for the advance-booking rules.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Calendar date in UTC, the same granularity reservations are stored at.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock stuck on one day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// The availability search: validate, find blocked rooms, aggregate by room type.
///
/// Holds no state besides its clock; every search reads the repository afresh.
#[derive(Debug, Clone, Default)]
pub struct Engine<C = SystemClock> {
    clock: C,
}

impl Engine<SystemClock> {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> Engine<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn validate(&self, request: &SearchRequest) -> Result<ValidatedSearch, ValidationErrors> {
        validate_search(request, self.clock.today())
    }

    /// Room types bookable for the request, cheapest first. An empty list is a
    /// normal answer: nothing fits this window and party size.
    pub async fn search_available<R>(
        &self,
        repo: &R,
        request: &SearchRequest,
    ) -> Result<Vec<AvailableRoomType>, EngineError>
    where
        R: Repository + ?Sized,
    {
        let start = Instant::now();
        let search = match self.validate(request) {
            Ok(search) => search,
            Err(errors) => {
                debug!("search rejected: {errors}");
                metrics::counter!(SEARCHES_TOTAL, "outcome" => "invalid").increment(1);
                return Err(errors.into());
            }
        };

        let result = self.search_validated(repo, &search).await;

        let outcome = match &result {
            Ok(rows) if rows.is_empty() => "empty",
            Ok(_) => "ok",
            Err(_) => "error",
        };
        metrics::counter!(SEARCHES_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(SEARCH_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
        result
    }

    /// Search with an already validated window and party size.
    pub async fn search_validated<R>(
        &self,
        repo: &R,
        search: &ValidatedSearch,
    ) -> Result<Vec<AvailableRoomType>, EngineError>
    where
        R: Repository + ?Sized,
    {
        let room_types = repo.room_types().await?;
        let rooms = repo.rooms().await?;
        let reservations = repo.reservations_overlapping(&search.window).await?;

        let unavailable = unavailable_rooms(&search.window, &rooms, &reservations);
        let available =
            available_room_types(&room_types, &rooms, &unavailable, search.guest_count);

        debug!(
            "search {} for {} guests: {} of {} rooms blocked, {} room types available",
            search.window,
            search.guest_count,
            unavailable.len(),
            rooms.len(),
            available.len()
        );
        metrics::histogram!(SEARCH_RESULTS).record(available.len() as f64);
        Ok(available)
    }
}
