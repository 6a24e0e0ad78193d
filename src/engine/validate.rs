use chrono::{Days, NaiveDate};

use crate::limits::MAX_ADVANCE_DAYS;
use crate::model::{SearchRequest, StayWindow};

use super::error::{Field, FieldError, ValidationErrors};

pub const GUEST_COUNT_TOO_LOW: &str = "Guest count must be at least 1";
pub const CHECK_OUT_NOT_AFTER_CHECK_IN: &str = "Check-out date must be after check-in date";
pub const CHECK_IN_IN_PAST: &str = "Check-in date cannot be in the past";
pub const CHECK_IN_TOO_FAR_AHEAD: &str = "Cannot search more than 365 days in advance";

/// A request that passed every rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedSearch {
    pub window: StayWindow,
    pub guest_count: u32,
}

/// Check a raw request against `today`. Rules are independent; all failures are reported.
pub fn validate_search(
    request: &SearchRequest,
    today: NaiveDate,
) -> Result<ValidatedSearch, ValidationErrors> {
    let mut errors = Vec::new();

    if request.guest_count < 1 {
        errors.push(FieldError {
            field: Field::GuestCount,
            message: GUEST_COUNT_TOO_LOW,
        });
    }

    let window = StayWindow::try_new(request.check_in, request.check_out);
    if window.is_none() {
        errors.push(FieldError {
            field: Field::CheckOutDate,
            message: CHECK_OUT_NOT_AFTER_CHECK_IN,
        });
    }

    if request.check_in < today {
        errors.push(FieldError {
            field: Field::CheckInDate,
            message: CHECK_IN_IN_PAST,
        });
    }

    // No upper bound when today + 365 runs off the calendar.
    if let Some(latest) = today.checked_add_days(Days::new(MAX_ADVANCE_DAYS))
        && request.check_in > latest
    {
        errors.push(FieldError {
            field: Field::CheckInDate,
            message: CHECK_IN_TOO_FAR_AHEAD,
        });
    }

    match (ValidationErrors::from_vec(errors), window) {
        (None, Some(window)) => Ok(ValidatedSearch {
            window,
            // Larger parties than u32::MAX fit no room anyway.
            guest_count: u32::try_from(request.guest_count).unwrap_or(u32::MAX),
        }),
        (Some(errors), _) => Err(errors),
        // An invalid window always records its error above.
        (None, None) => Err(ValidationErrors::single(
            Field::CheckOutDate,
            CHECK_OUT_NOT_AFTER_CHECK_IN,
        )),
    }
}
