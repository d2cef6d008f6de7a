use crate::config::{BookingPolicy, HallBilling};
use crate::error::{Error, Result};
use crate::model::*;

/// Cost breakdown of one booking, before the advance split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Charges {
    pub rooms: Amount,
    pub extra_beds: Amount,
    pub halls: Amount,
    pub food: Amount,
}

impl Charges {
    pub fn total(&self) -> Result<Amount> {
        [self.extra_beds, self.halls, self.food]
            .into_iter()
            .try_fold(self.rooms, Amount::checked_add)
            .ok_or(TOO_LARGE)
    }
}

const TOO_LARGE: Error = Error::LimitExceeded("booking total too large");

fn product(factors: &[Amount]) -> Result<Amount> {
    factors
        .iter()
        .try_fold(1, |acc: Amount, f| acc.checked_mul(*f))
        .ok_or(TOO_LARGE)
}

fn sum_selected(items: impl IntoIterator<Item = (bool, Option<Amount>)>) -> Result<Amount> {
    items
        .into_iter()
        .filter(|(selected, _)| *selected)
        .try_fold(0, |acc: Amount, (_, price)| acc.checked_add(price.unwrap_or(0)))
        .ok_or(TOO_LARGE)
}

pub fn charges(request: &BookingRequest, policy: &BookingPolicy) -> Result<Charges> {
    let nights = Amount::from(request.window.nights());
    let prices = &request.prices;

    let rooms = product(&[prices.price_per_room, Amount::from(request.number_of_rooms), nights])?;
    let extra_beds = product(&[
        Amount::from(request.extras.extra_beds),
        prices.extra_bed_price.unwrap_or(0),
        nights,
    ])?;

    let per_unit_halls = sum_selected([
        (request.halls.hall1, prices.hall1_price),
        (request.halls.hall2, prices.hall2_price),
    ])?;
    let halls = match policy.hall_billing {
        HallBilling::PerNight => product(&[per_unit_halls, nights])?,
        HallBilling::PerStay => per_unit_halls,
    };

    let meals = sum_selected([
        (request.extras.breakfast, prices.breakfast_price),
        (request.extras.lunch, prices.lunch_price),
        (request.extras.dinner, prices.dinner_price),
    ])?;
    let food = product(&[meals, Amount::from(request.number_of_guests), nights])?;

    Ok(Charges {
        rooms,
        extra_beds,
        halls,
        food,
    })
}

/// Total, advance and balance for a request. Pure.
pub fn compute_financials(request: &BookingRequest, policy: &BookingPolicy) -> Result<Financials> {
    let total_amount = charges(request, policy)?.total()?;
    let advance_amount = advance_of(total_amount, policy.advance_percent);
    Ok(Financials {
        total_amount,
        advance_amount,
        balance_amount: total_amount - advance_amount,
    })
}

/// `percent` of `total`, rounded half up. Never exceeds `total`.
fn advance_of(total: Amount, percent: u32) -> Amount {
    let percent = u128::from(percent.min(100));
    ((u128::from(total) * percent + 50) / 100) as Amount
}
