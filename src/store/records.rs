use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::model::{Booking, Collection, LedgerEntry, Payment};

use super::{Document, DocumentStore, RangeQuery, StoreError};

/// A typed document living in one collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
    /// Body field that mirrors the document key.
    const KEY_FIELD: &'static str;

    fn key(&self) -> String;
}

impl Record for Booking {
    const COLLECTION: Collection = Collection::Bookings;
    const KEY_FIELD: &'static str = "id";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Record for Payment {
    const COLLECTION: Collection = Collection::Payments;
    const KEY_FIELD: &'static str = "id";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Record for LedgerEntry {
    const COLLECTION: Collection = Collection::Availability;
    const KEY_FIELD: &'static str = "date";

    fn key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

pub(crate) fn decode<R: Record>(doc: Document) -> Result<R, StoreError> {
    serde_json::from_value(doc.body).map_err(|e| StoreError::Codec {
        collection: R::COLLECTION,
        id: doc.id,
        reason: e.to_string(),
    })
}

fn encode<R: Record>(record: &R) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Codec {
        collection: R::COLLECTION,
        id: record.key(),
        reason: e.to_string(),
    })
}

/// Typed access on top of any [`DocumentStore`].
#[async_trait]
pub trait RecordStore: DocumentStore {
    async fn load<R: Record>(&self, key: &str) -> Result<Option<R>, StoreError> {
        match self.get(R::COLLECTION, key).await? {
            Some(doc) => decode(doc).map(Some),
            None => Ok(None),
        }
    }

    async fn save<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let body = encode(record)?;
        self.put(R::COLLECTION, &record.key(), body).await
    }

    async fn remove<R: Record>(&self, key: &str) -> Result<bool, StoreError> {
        self.delete(R::COLLECTION, key).await
    }

    async fn query<R: Record>(&self, query: &RangeQuery) -> Result<Vec<R>, StoreError> {
        self.query_range(R::COLLECTION, query)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn load_all<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        self.query::<R>(&RangeQuery::all()).await
    }
}

impl<S: DocumentStore + ?Sized> RecordStore for S {}
