use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::Capacity;
use crate::model::*;

// ── Availability Algorithm ────────────────────────────────────────

/// Capacity claimed on one date by active bookings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayDemand {
    pub rooms: u32,
    /// Bookings holding hall 1 (more than one means overbooked).
    pub hall1: u32,
    pub hall2: u32,
}

impl DayDemand {
    pub fn halls(&self) -> u32 {
        self.hall1 + self.hall2
    }

    fn add(&mut self, demand: Demand) {
        self.rooms = self.rooms.saturating_add(demand.rooms);
        self.hall1 += u32::from(demand.halls.hall1);
        self.hall2 += u32::from(demand.halls.hall2);
    }
}

/// First date and resource a request could not get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub date: NaiveDate,
    pub resource: Resource,
    pub requested: u32,
    pub available: u32,
}

/// Sum demand per date over active bookings, optionally clamped to `window`.
/// O(bookings × nights).
pub fn accumulate_demand<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    window: Option<&StayWindow>,
) -> BTreeMap<NaiveDate, DayDemand> {
    let mut by_date: BTreeMap<NaiveDate, DayDemand> = BTreeMap::new();
    for booking in bookings {
        if !booking.is_active() {
            continue;
        }
        let demand = booking.demand();
        for date in booking.window.dates() {
            if window.is_some_and(|w| !w.contains(date)) {
                continue;
            }
            by_date.entry(date).or_default().add(demand);
        }
    }
    by_date
}

pub fn day_availability(date: NaiveDate, capacity: Capacity, demand: &DayDemand) -> DayAvailability {
    DayAvailability {
        date,
        available_rooms: capacity.total_rooms().saturating_sub(demand.rooms),
        available_halls: capacity.total_halls().saturating_sub(demand.halls()),
        hall1_free: capacity.total_halls() >= 1 && demand.hall1 == 0,
        hall2_free: capacity.total_halls() >= 2 && demand.hall2 == 0,
    }
}

/// One entry per date of `window`; dates without demand are fully available.
pub fn availability_by_day(
    window: &StayWindow,
    capacity: Capacity,
    demand: &BTreeMap<NaiveDate, DayDemand>,
) -> Vec<DayAvailability> {
    window
        .dates()
        .map(|date| {
            let day = demand.get(&date).copied().unwrap_or_default();
            day_availability(date, capacity, &day)
        })
        .collect()
}

/// The earliest date on which `request` does not fit. Rooms are checked
/// before halls on each date.
pub fn first_shortfall(days: &[DayAvailability], request: Demand) -> Option<Shortfall> {
    for day in days {
        if request.rooms > day.available_rooms {
            return Some(Shortfall {
                date: day.date,
                resource: Resource::Rooms,
                requested: request.rooms,
                available: day.available_rooms,
            });
        }
        if request.halls.hall1 && !day.hall1_free {
            return Some(Shortfall {
                date: day.date,
                resource: Resource::Hall1,
                requested: 1,
                available: 0,
            });
        }
        if request.halls.hall2 && !day.hall2_free {
            return Some(Shortfall {
                date: day.date,
                resource: Resource::Hall2,
                requested: 1,
                available: 0,
            });
        }
    }
    None
}
