//! Fixtures shared by the unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::*;
use crate::notify::ChangeNotice;
use crate::store::{Document, DocumentStore, RangeQuery, StoreError, WalStore};

pub fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

pub fn w(check_in: &str, check_out: &str) -> StayWindow {
    StayWindow::new(d(check_in), d(check_out))
}

pub fn halls(hall1: bool, hall2: bool) -> HallSelection {
    HallSelection { hall1, hall2 }
}

/// A stored booking with just enough fields for ledger arithmetic.
pub fn stored_booking(window: StayWindow, rooms: u32, halls: HallSelection, status: BookingStatus) -> Booking {
    let now = Utc::now();
    Booking {
        id: Ulid::new(),
        guest: Guest {
            guest_name: "Test Guest".into(),
            mobile: "9800000000".into(),
            address: None,
            special_note: None,
        },
        window,
        number_of_rooms: rooms,
        halls,
        number_of_guests: rooms.max(1),
        extras: Extras::default(),
        prices: Prices {
            price_per_room: 1000,
            hall1_price: Some(5000),
            hall2_price: Some(5000),
            ..Prices::default()
        },
        financials: Financials::default(),
        amount_paid: 0,
        status,
        created_at: now,
        updated_at: now,
    }
}

pub fn request(window: StayWindow, rooms: u32) -> BookingRequest {
    BookingRequest {
        guest: Guest {
            guest_name: "Asha Rao".into(),
            mobile: "9800000000".into(),
            address: Some("Udupi".into()),
            special_note: None,
        },
        window,
        number_of_rooms: rooms,
        halls: HallSelection::NONE,
        number_of_guests: rooms,
        extras: Extras::default(),
        prices: Prices {
            price_per_room: 1000,
            ..Prices::default()
        },
    }
}

/// Store wrapper that rejects one put to a collection after a number of
/// successful ones.
pub struct FlakyStore {
    inner: WalStore,
    budget: DashMap<Collection, usize>,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: WalStore::in_memory(),
            budget: DashMap::new(),
        })
    }

    /// Let `successes` more puts to `collection` through, fail the next one,
    /// then behave normally again.
    pub fn fail_put_after(&self, collection: Collection, successes: usize) {
        self.budget.insert(collection, successes);
    }

    fn spend(&self, collection: Collection) -> Result<(), StoreError> {
        let exhausted = match self.budget.get_mut(&collection) {
            Some(mut left) if *left > 0 => {
                *left -= 1;
                false
            }
            Some(_) => true,
            None => false,
        };
        if exhausted {
            self.budget.remove(&collection);
            return Err(StoreError::Io("injected write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn put(&self, collection: Collection, id: &str, body: Value) -> Result<(), StoreError> {
        self.spend(collection)?;
        self.inner.put(collection, id, body).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(collection, id).await
    }

    async fn query_range(&self, collection: Collection, query: &RangeQuery) -> Result<Vec<Document>, StoreError> {
        self.inner.query_range(collection, query).await
    }

    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeNotice> {
        self.inner.subscribe(collection)
    }
}
