use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::config::Capacity;

/// Whole currency units.
pub type Amount = u64;

/// Half-open stay window `[check_in, check_out)`: the guest occupies every
/// night from check-in up to, but not including, check-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayWindow {
    #[serde(rename = "checkInDate")]
    pub check_in: NaiveDate,
    #[serde(rename = "checkOutDate")]
    pub check_out: NaiveDate,
}

impl StayWindow {
    /// Unchecked constructor for dates already known to be ordered. Use
    /// [`try_new`](Self::try_new) for caller input; an inverted window has no
    /// nights and is refused by booking validation and engine queries.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "check-out must be after check-in");
        Self { check_in, check_out }
    }

    /// `None` unless check-out is strictly after check-in.
    pub fn try_new(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_in < check_out).then_some(Self { check_in, check_out })
    }

    pub fn nights(&self) -> u32 {
        (self.check_out - self.check_in).num_days().max(0) as u32
    }

    pub fn overlaps(&self, other: &StayWindow) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    /// Smallest window covering both.
    pub fn union(&self, other: &StayWindow) -> StayWindow {
        StayWindow {
            check_in: self.check_in.min(other.check_in),
            check_out: self.check_out.max(other.check_out),
        }
    }

    /// Every occupied date, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.check_out;
        self.check_in.iter_days().take_while(move |d| *d < end)
    }
}

impl std::fmt::Display for StayWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

/// Each hall is an independent binary resource, not a count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallSelection {
    pub hall1: bool,
    pub hall2: bool,
}

impl HallSelection {
    pub const NONE: HallSelection = HallSelection { hall1: false, hall2: false };

    pub fn count(&self) -> u32 {
        u32::from(self.hall1) + u32::from(self.hall2)
    }

    pub fn is_empty(&self) -> bool {
        !self.hall1 && !self.hall2
    }

    /// Highest hall number selected (0 if none).
    pub fn highest(&self) -> u32 {
        if self.hall2 {
            2
        } else if self.hall1 {
            1
        } else {
            0
        }
    }
}

/// Capacity consumed by a booking on each night of its stay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Demand {
    pub rooms: u32,
    pub halls: HallSelection,
}

impl Demand {
    pub fn new(rooms: u32, halls: HallSelection) -> Self {
        Self { rooms, halls }
    }

    pub fn hall_count(&self) -> u32 {
        self.halls.count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// `pending → confirmed → completed`, and any non-terminal state may be cancelled.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Completed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement progress, derived from the amounts on a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Unpaid,
    AdvancePaid,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub guest_name: String,
    pub mobile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extras {
    pub extra_beds: u32,
    pub breakfast: bool,
    pub lunch: bool,
    pub dinner: bool,
}

/// Per-unit prices. Optional prices are only required when the priced
/// option is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prices {
    pub price_per_room: Amount,
    #[serde(default)]
    pub extra_bed_price: Option<Amount>,
    #[serde(default)]
    pub hall1_price: Option<Amount>,
    #[serde(default)]
    pub hall2_price: Option<Amount>,
    #[serde(default)]
    pub breakfast_price: Option<Amount>,
    #[serde(default)]
    pub lunch_price: Option<Amount>,
    #[serde(default)]
    pub dinner_price: Option<Amount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Financials {
    pub total_amount: Amount,
    pub advance_amount: Amount,
    pub balance_amount: Amount,
}

/// Everything a caller supplies to create a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub guest: Guest,
    pub window: StayWindow,
    pub number_of_rooms: u32,
    pub halls: HallSelection,
    pub number_of_guests: u32,
    pub extras: Extras,
    pub prices: Prices,
}

impl BookingRequest {
    pub fn demand(&self) -> Demand {
        Demand::new(self.number_of_rooms, self.halls)
    }
}

/// Field patch for an existing booking. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingChanges {
    pub guest: Option<Guest>,
    pub window: Option<StayWindow>,
    pub number_of_rooms: Option<u32>,
    pub halls: Option<HallSelection>,
    pub number_of_guests: Option<u32>,
    pub extras: Option<Extras>,
    pub prices: Option<Prices>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Ulid,
    #[serde(flatten)]
    pub guest: Guest,
    #[serde(flatten)]
    pub window: StayWindow,
    pub number_of_rooms: u32,
    #[serde(flatten)]
    pub halls: HallSelection,
    pub number_of_guests: u32,
    #[serde(flatten)]
    pub extras: Extras,
    #[serde(flatten)]
    pub prices: Prices,
    #[serde(flatten)]
    pub financials: Financials,
    #[serde(default)]
    pub amount_paid: Amount,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Cancelled bookings hold no capacity.
    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    pub fn demand(&self) -> Demand {
        Demand::new(self.number_of_rooms, self.halls)
    }

    pub fn balance_due(&self) -> Amount {
        self.financials.total_amount.saturating_sub(self.amount_paid)
    }

    pub fn payment_state(&self) -> PaymentState {
        if self.amount_paid >= self.financials.total_amount {
            PaymentState::Settled
        } else if self.amount_paid > 0 {
            PaymentState::AdvancePaid
        } else {
            PaymentState::Unpaid
        }
    }

    /// The request that would recreate this booking's priced inputs.
    pub fn as_request(&self) -> BookingRequest {
        BookingRequest {
            guest: self.guest.clone(),
            window: self.window,
            number_of_rooms: self.number_of_rooms,
            halls: self.halls,
            number_of_guests: self.number_of_guests,
            extras: self.extras,
            prices: self.prices,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Cash,
    #[serde(rename = "gpay")]
    GPay,
    Online,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "cash",
            PaymentMode::GPay => "gpay",
            PaymentMode::Online => "online",
        }
    }
}

impl std::str::FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMode::Cash),
            "gpay" => Ok(PaymentMode::GPay),
            "online" => Ok(PaymentMode::Online),
            other => Err(format!("unknown payment mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Advance,
    Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub amount: Amount,
    pub mode: PaymentMode,
    #[serde(rename = "type")]
    pub kind: PaymentKind,
    pub paid_at: DateTime<Utc>,
}

/// Per-date aggregate of booked and available capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub total_rooms: u32,
    pub total_halls: u32,
    pub booked_rooms: u32,
    pub booked_halls: u32,
    pub available_rooms: u32,
    pub available_halls: u32,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Entry for a date nothing has booked yet.
    pub fn vacant(date: NaiveDate, capacity: Capacity, now: DateTime<Utc>) -> Self {
        Self::from_booked(date, capacity, 0, 0, now)
    }

    pub fn from_booked(
        date: NaiveDate,
        capacity: Capacity,
        booked_rooms: u32,
        booked_halls: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self {
            date,
            total_rooms: capacity.total_rooms(),
            total_halls: capacity.total_halls(),
            booked_rooms,
            booked_halls,
            available_rooms: 0,
            available_halls: 0,
            updated_at: now,
        };
        entry.recompute_available();
        entry
    }

    /// Add booked capacity. Available counts floor at zero on overbooking.
    pub fn reserve(&mut self, rooms: u32, halls: u32, now: DateTime<Utc>) {
        self.booked_rooms = self.booked_rooms.saturating_add(rooms);
        self.booked_halls = self.booked_halls.saturating_add(halls);
        self.recompute_available();
        self.updated_at = now;
    }

    /// Remove booked capacity. Booked counts floor at zero.
    pub fn release(&mut self, rooms: u32, halls: u32, now: DateTime<Utc>) {
        self.booked_rooms = self.booked_rooms.saturating_sub(rooms);
        self.booked_halls = self.booked_halls.saturating_sub(halls);
        self.recompute_available();
        self.updated_at = now;
    }

    /// Refresh totals from the registry (capacity may have been reconfigured).
    pub fn set_capacity(&mut self, capacity: Capacity) {
        self.total_rooms = capacity.total_rooms();
        self.total_halls = capacity.total_halls();
        self.recompute_available();
    }

    /// Same counts, ignoring the timestamp.
    pub fn same_counts(&self, other: &LedgerEntry) -> bool {
        self.date == other.date
            && self.total_rooms == other.total_rooms
            && self.total_halls == other.total_halls
            && self.booked_rooms == other.booked_rooms
            && self.booked_halls == other.booked_halls
            && self.available_rooms == other.available_rooms
            && self.available_halls == other.available_halls
    }

    fn recompute_available(&mut self) {
        self.available_rooms = self.total_rooms.saturating_sub(self.booked_rooms);
        self.available_halls = self.total_halls.saturating_sub(self.booked_halls);
    }
}

/// Capacity left on one date, computed from the booking store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub available_rooms: u32,
    pub available_halls: u32,
    pub hall1_free: bool,
    pub hall2_free: bool,
}

/// The capacity a rejected request ran out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Rooms,
    Hall1,
    Hall2,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Rooms => f.write_str("rooms"),
            Resource::Hall1 => f.write_str("hall 1"),
            Resource::Hall2 => f.write_str("hall 2"),
        }
    }
}

// ── Store records ────────────────────────────────────────────────

/// The document collections this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    Bookings,
    Payments,
    Availability,
    Logs,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Bookings,
        Collection::Payments,
        Collection::Availability,
        Collection::Logs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Bookings => "bookings",
            Collection::Payments => "payments",
            Collection::Availability => "availability",
            Collection::Logs => "logs",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Store mutations — flat, no nesting. This is the WAL record format.
/// Bodies are JSON text so the record stays self-describing under bincode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Put {
        collection: Collection,
        id: String,
        body: String,
    },
    Delete {
        collection: Collection,
        id: String,
    },
}

impl Event {
    pub fn collection(&self) -> Collection {
        match self {
            Event::Put { collection, .. } | Event::Delete { collection, .. } => *collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Event::Put { id, .. } | Event::Delete { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn cap() -> Capacity {
        Capacity::new(13, 2)
    }

    #[test]
    fn window_basics() {
        let w = StayWindow::new(d("2025-01-10"), d("2025-01-12"));
        assert_eq!(w.nights(), 2);
        assert!(w.contains(d("2025-01-10")));
        assert!(w.contains(d("2025-01-11")));
        assert!(!w.contains(d("2025-01-12"))); // check-out exclusive
        let dates: Vec<_> = w.dates().collect();
        assert_eq!(dates, vec![d("2025-01-10"), d("2025-01-11")]);
    }

    #[test]
    fn window_overlap_is_half_open() {
        let a = StayWindow::new(d("2025-01-10"), d("2025-01-12"));
        let b = StayWindow::new(d("2025-01-11"), d("2025-01-14"));
        let c = StayWindow::new(d("2025-01-12"), d("2025-01-13"));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // back-to-back stays share no night
    }

    #[test]
    fn window_try_new_rejects_empty() {
        assert!(StayWindow::try_new(d("2025-01-10"), d("2025-01-10")).is_none());
        assert!(StayWindow::try_new(d("2025-01-11"), d("2025-01-10")).is_none());
    }

    #[test]
    fn window_union_spans_gap() {
        let a = StayWindow::new(d("2025-01-10"), d("2025-01-12"));
        let b = StayWindow::new(d("2025-01-20"), d("2025-01-21"));
        let u = a.union(&b);
        assert_eq!(u.check_in, d("2025-01-10"));
        assert_eq!(u.check_out, d("2025-01-21"));
    }

    #[test]
    fn dates_cross_month_boundary() {
        let w = StayWindow::new(d("2025-01-30"), d("2025-02-02"));
        let dates: Vec<_> = w.dates().collect();
        assert_eq!(dates, vec![d("2025-01-30"), d("2025-01-31"), d("2025-02-01")]);
    }

    #[test]
    fn status_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(Cancelled.is_terminal() && Completed.is_terminal());
    }

    #[test]
    fn ledger_entry_clamps_on_overbooking() {
        let now = Utc::now();
        let mut e = LedgerEntry::vacant(d("2025-01-10"), cap(), now);
        e.reserve(10, 1, now);
        e.reserve(5, 2, now);
        assert_eq!(e.booked_rooms, 15);
        assert_eq!(e.available_rooms, 0);
        assert_eq!(e.booked_halls, 3);
        assert_eq!(e.available_halls, 0);

        e.release(5, 2, now);
        assert_eq!(e.booked_rooms, 10);
        assert_eq!(e.available_rooms, 3);
        assert_eq!(e.available_halls, 1);
    }

    #[test]
    fn ledger_entry_release_floors_at_zero() {
        let now = Utc::now();
        let mut e = LedgerEntry::vacant(d("2025-01-10"), cap(), now);
        e.reserve(2, 0, now);
        e.release(7, 1, now);
        assert_eq!(e.booked_rooms, 0);
        assert_eq!(e.booked_halls, 0);
        assert_eq!(e.available_rooms, 13);
        assert_eq!(e.available_halls, 2);
    }

    #[test]
    fn ledger_entry_json_uses_camel_case() {
        let e = LedgerEntry::from_booked(d("2025-01-10"), cap(), 5, 1, Utc::now());
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["date"], "2025-01-10");
        assert_eq!(v["bookedRooms"], 5);
        assert_eq!(v["availableRooms"], 8);
        assert_eq!(v["availableHalls"], 1);
    }

    #[test]
    fn booking_json_is_flat() {
        let now = Utc::now();
        let b = Booking {
            id: Ulid::new(),
            guest: Guest {
                guest_name: "Asha".into(),
                mobile: "9800000000".into(),
                address: None,
                special_note: None,
            },
            window: StayWindow::new(d("2025-01-10"), d("2025-01-12")),
            number_of_rooms: 2,
            halls: HallSelection { hall1: true, hall2: false },
            number_of_guests: 4,
            extras: Extras::default(),
            prices: Prices { price_per_room: 1000, ..Prices::default() },
            financials: Financials { total_amount: 4000, advance_amount: 2000, balance_amount: 2000 },
            amount_paid: 0,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["checkInDate"], "2025-01-10");
        assert_eq!(v["checkOutDate"], "2025-01-12");
        assert_eq!(v["hall1"], true);
        assert_eq!(v["guestName"], "Asha");
        assert_eq!(v["totalAmount"], 4000);
        assert_eq!(v["status"], "pending");

        let back: Booking = serde_json::from_value(v).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn payment_state_follows_amounts() {
        let now = Utc::now();
        let mut b = Booking {
            id: Ulid::new(),
            guest: Guest::default(),
            window: StayWindow::new(d("2025-01-10"), d("2025-01-11")),
            number_of_rooms: 1,
            halls: HallSelection::NONE,
            number_of_guests: 1,
            extras: Extras::default(),
            prices: Prices::default(),
            financials: Financials { total_amount: 1000, advance_amount: 500, balance_amount: 500 },
            amount_paid: 0,
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(b.payment_state(), PaymentState::Unpaid);
        b.amount_paid = 500;
        assert_eq!(b.payment_state(), PaymentState::AdvancePaid);
        assert_eq!(b.balance_due(), 500);
        b.amount_paid = 1000;
        assert_eq!(b.payment_state(), PaymentState::Settled);
        assert_eq!(b.balance_due(), 0);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::Put {
            collection: Collection::Availability,
            id: "2025-01-10".into(),
            body: r#"{"date":"2025-01-10"}"#.into(),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
