use crate::config::Capacity;
use crate::error::{Error, Result};
use crate::limits::*;
use crate::model::*;

fn invalid(msg: impl Into<String>) -> Error {
    Error::Validation(msg.into())
}

/// Reject a request that could never be stored, before touching the ledger.
pub fn validate_request(request: &BookingRequest, capacity: Capacity) -> Result<()> {
    validate_window(&request.window)?;
    validate_demand(request.demand(), capacity)?;
    validate_guest(&request.guest)?;

    if request.number_of_guests == 0 {
        return Err(invalid("at least one guest is required"));
    }
    if request.number_of_guests > MAX_GUESTS_PER_BOOKING {
        return Err(Error::LimitExceeded("too many guests"));
    }
    if request.extras.extra_beds > MAX_EXTRA_BEDS {
        return Err(Error::LimitExceeded("too many extra beds"));
    }

    validate_prices(request)
}

pub fn validate_window(window: &StayWindow) -> Result<()> {
    if window.check_out <= window.check_in {
        return Err(invalid(format!(
            "check-out {} must be after check-in {}",
            window.check_out, window.check_in
        )));
    }
    if window.nights() > MAX_STAY_NIGHTS {
        return Err(Error::LimitExceeded("stay too long"));
    }
    Ok(())
}

pub fn validate_demand(demand: Demand, capacity: Capacity) -> Result<()> {
    if demand.rooms == 0 {
        return Err(invalid("number of rooms must be at least 1"));
    }
    if demand.rooms > capacity.total_rooms() {
        return Err(invalid(format!(
            "number of rooms {} exceeds the {} the property has",
            demand.rooms,
            capacity.total_rooms()
        )));
    }
    if demand.halls.highest() > capacity.total_halls() {
        return Err(invalid(format!("hall {} does not exist", demand.halls.highest())));
    }
    Ok(())
}

fn validate_guest(guest: &Guest) -> Result<()> {
    if guest.guest_name.trim().is_empty() {
        return Err(invalid("guest name is required"));
    }
    if guest.guest_name.len() > MAX_GUEST_NAME_LEN {
        return Err(Error::LimitExceeded("guest name too long"));
    }
    let mobile = guest.mobile.trim();
    if mobile.is_empty() {
        return Err(invalid("mobile number is required"));
    }
    if mobile.len() > MAX_MOBILE_LEN {
        return Err(Error::LimitExceeded("mobile number too long"));
    }
    if !mobile.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-')) {
        return Err(invalid(format!("mobile number {mobile:?} has invalid characters")));
    }
    let long_text = [&guest.address, &guest.special_note]
        .into_iter()
        .flatten()
        .any(|text| text.len() > MAX_NOTE_LEN);
    if long_text {
        return Err(Error::LimitExceeded("address or note too long"));
    }
    Ok(())
}

/// Every selected priced option needs a price.
fn validate_prices(request: &BookingRequest) -> Result<()> {
    let prices = &request.prices;
    let required = [
        (request.extras.extra_beds > 0, prices.extra_bed_price, "extra bed"),
        (request.halls.hall1, prices.hall1_price, "hall 1"),
        (request.halls.hall2, prices.hall2_price, "hall 2"),
        (request.extras.breakfast, prices.breakfast_price, "breakfast"),
        (request.extras.lunch, prices.lunch_price, "lunch"),
        (request.extras.dinner, prices.dinner_price, "dinner"),
    ];
    for (selected, price, what) in required {
        if selected && price.is_none() {
            return Err(invalid(format!("{what} selected without a price")));
        }
    }
    let mut all = required.iter().filter_map(|(_, price, _)| *price);
    if prices.price_per_room > MAX_UNIT_PRICE || all.any(|p| p > MAX_UNIT_PRICE) {
        return Err(Error::LimitExceeded("unit price too high"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    const CAP: Capacity = Capacity::new(13, 2);

    fn message(err: Error) -> String {
        match err {
            Error::Validation(msg) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_a_plain_request() {
        validate_request(&request(w("2025-01-10", "2025-01-12"), 2), CAP).unwrap();
    }

    #[test]
    fn rejects_zero_and_excess_rooms() {
        let err = validate_request(&request(w("2025-01-10", "2025-01-12"), 0), CAP).unwrap_err();
        assert!(message(err).contains("at least 1"));
        let err = validate_request(&request(w("2025-01-10", "2025-01-12"), 14), CAP).unwrap_err();
        assert!(message(err).contains("exceeds"));
    }

    #[test]
    fn rejects_inverted_window() {
        let mut req = request(w("2025-01-10", "2025-01-12"), 1);
        req.window = StayWindow {
            check_in: d("2025-01-12"),
            check_out: d("2025-01-12"),
        };
        assert!(matches!(validate_request(&req, CAP), Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_overlong_stay() {
        let req = request(w("2025-01-01", "2025-06-01"), 1);
        assert!(matches!(validate_request(&req, CAP), Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn rejects_hall_beyond_capacity() {
        let mut req = request(w("2025-01-10", "2025-01-11"), 1);
        req.halls = halls(false, true);
        req.prices.hall2_price = Some(3000);
        validate_request(&req, CAP).unwrap();
        let err = validate_request(&req, Capacity::new(13, 1)).unwrap_err();
        assert!(message(err).contains("hall 2"));
    }

    #[test]
    fn priced_options_need_prices() {
        let mut req = request(w("2025-01-10", "2025-01-11"), 1);
        req.extras.lunch = true;
        assert!(message(validate_request(&req, CAP).unwrap_err()).contains("lunch"));
        req.prices.lunch_price = Some(150);
        validate_request(&req, CAP).unwrap();

        req.extras.extra_beds = 2;
        assert!(message(validate_request(&req, CAP).unwrap_err()).contains("extra bed"));
    }

    #[test]
    fn unit_prices_are_capped() {
        let mut req = request(w("2025-01-10", "2025-01-11"), 1);
        req.prices.price_per_room = MAX_UNIT_PRICE;
        validate_request(&req, CAP).unwrap();
        req.prices.price_per_room = MAX_UNIT_PRICE + 1;
        assert!(matches!(validate_request(&req, CAP), Err(Error::LimitExceeded(_))));

        // Unselected options are capped too; they are stored with the booking.
        let mut req = request(w("2025-01-10", "2025-01-11"), 1);
        req.prices.dinner_price = Some(u64::MAX);
        assert!(matches!(validate_request(&req, CAP), Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn guest_details_are_required() {
        let mut req = request(w("2025-01-10", "2025-01-11"), 1);
        req.guest.guest_name = "   ".into();
        assert!(message(validate_request(&req, CAP).unwrap_err()).contains("guest name"));

        let mut req = request(w("2025-01-10", "2025-01-11"), 1);
        req.guest.mobile = "98x00".into();
        assert!(message(validate_request(&req, CAP).unwrap_err()).contains("invalid characters"));

        let mut req = request(w("2025-01-10", "2025-01-11"), 1);
        req.number_of_guests = 0;
        assert!(message(validate_request(&req, CAP).unwrap_err()).contains("guest"));
    }
}
