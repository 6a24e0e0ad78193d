/// How far ahead of today a stay may start.
pub const MAX_ADVANCE_DAYS: u64 = 365;

pub const MAX_ROOM_TYPES_PER_PROPERTY: usize = 1_000;
pub const MAX_ROOMS_PER_PROPERTY: usize = 10_000;
pub const MAX_GUESTS_PER_PROPERTY: usize = 1_000_000;
pub const MAX_RESERVATIONS_PER_PROPERTY: usize = 1_000_000;

pub const MAX_ROOM_TYPE_NAME_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_ROOM_NUMBER_LEN: usize = 10;
pub const MAX_PERSON_NAME_LEN: usize = 50;
pub const MAX_EMAIL_LEN: usize = 100;
pub const MAX_PHONE_LEN: usize = 20;

/// Rows accepted by one multi-row INSERT.
pub const MAX_BATCH_SIZE: usize = 1_000;

pub const MAX_TENANTS: usize = 1_000;
pub const MAX_TENANT_NAME_LEN: usize = 63;
