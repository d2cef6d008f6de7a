//! Generic document store: create/read/update/delete by id, range queries on
//! one field, and change subscriptions.

mod records;
mod subscription;
mod wal_store;

pub use records::{Record, RecordStore};
pub use subscription::Subscription;
pub use wal_store::WalStore;

use std::cmp::Ordering;
use std::ops::Bound;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::model::Collection;
use crate::notify::ChangeNotice;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("cannot decode {collection}/{id}: {reason}")]
    Codec {
        collection: Collection,
        id: String,
        reason: String,
    },
    #[error("store is shut down")]
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub body: Value,
}

/// Range over a single field. The pseudo-field `"id"` addresses the document key.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub field: String,
    pub lower: Bound<Value>,
    pub upper: Bound<Value>,
}

impl RangeQuery {
    /// Every document in the collection.
    pub fn all() -> Self {
        Self {
            field: "id".into(),
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// `start <= field < end`.
    pub fn half_open(field: &str, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            lower: Bound::Included(start.into()),
            upper: Bound::Excluded(end.into()),
        }
    }

    /// `field == value`.
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            field: field.into(),
            lower: Bound::Included(value.clone()),
            upper: Bound::Included(value),
        }
    }

    /// `field < end`.
    pub fn below(field: &str, end: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            lower: Bound::Unbounded,
            upper: Bound::Excluded(end.into()),
        }
    }

    pub fn is_key_range(&self) -> bool {
        self.field == "id"
    }

    /// True if `value` falls inside the range. Values of different JSON
    /// types never match.
    pub fn contains(&self, value: &Value) -> bool {
        let above = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(lo) => matches!(compare(value, lo), Some(Ordering::Greater | Ordering::Equal)),
            Bound::Excluded(lo) => matches!(compare(value, lo), Some(Ordering::Greater)),
        };
        let below = match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(hi) => matches!(compare(value, hi), Some(Ordering::Less | Ordering::Equal)),
            Bound::Excluded(hi) => matches!(compare(value, hi), Some(Ordering::Less)),
        };
        above && below
    }

    pub fn matches(&self, id: &str, body: &Value) -> bool {
        if self.is_key_range() {
            return self.contains(&Value::String(id.to_string()));
        }
        body.get(&self.field).is_some_and(|v| self.contains(v))
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                Some(a.cmp(&b))
            } else if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
                Some(a.cmp(&b))
            } else {
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
        }
        _ => None,
    }
}

/// The four primitives the ledger and the booking manager rely on.
/// Results are ordered by document id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Create or replace.
    async fn put(&self, collection: Collection, id: &str, body: Value) -> Result<(), StoreError>;

    /// Returns whether the document existed.
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    async fn query_range(
        &self,
        collection: Collection,
        query: &RangeQuery,
    ) -> Result<Vec<Document>, StoreError>;

    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        self.query_range(collection, &RangeQuery::all()).await
    }

    /// Change notices for one collection, delivered after the change is visible.
    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeNotice>;
}
