//! Hard limits on request sizes.

/// Longest stay a single booking may cover.
pub const MAX_STAY_NIGHTS: u32 = 90;

/// Widest window an availability query or ledger read may cover.
pub const MAX_QUERY_WINDOW_DAYS: u32 = 732;

pub const MAX_GUEST_NAME_LEN: usize = 200;
pub const MAX_MOBILE_LEN: usize = 32;
pub const MAX_NOTE_LEN: usize = 2000;

pub const MAX_GUESTS_PER_BOOKING: u32 = 500;
pub const MAX_EXTRA_BEDS: u32 = 50;

/// Highest price accepted for any single unit (room night, bed, hall, meal).
pub const MAX_UNIT_PRICE: u64 = 10_000_000;
