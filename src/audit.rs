use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

use crate::model::Collection;
use crate::store::{DocumentStore, Record, RecordStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    BookingCreated,
    BookingEdited,
    BookingConfirmed,
    BookingCompleted,
    BookingCancelled,
    BookingDeleted,
    PaymentRecorded,
    LedgerRebuilt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Ulid,
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Ulid>,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl Record for AuditRecord {
    const COLLECTION: Collection = Collection::Logs;
    const KEY_FIELD: &'static str = "id";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Append-only trail of administrative actions. Not needed for correctness:
/// failures are logged and swallowed.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn DocumentStore>,
    ids: Arc<Mutex<Generator>>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            ids: Arc::new(Mutex::new(Generator::new())),
        }
    }

    /// Monotonic within this process, so ids sort in append order.
    fn next_id(&self) -> Ulid {
        match self.ids.lock() {
            Ok(mut generator) => generator.generate().unwrap_or_else(|_| Ulid::new()),
            Err(_) => Ulid::new(),
        }
    }

    pub async fn append(&self, action: AuditAction, booking_id: Option<Ulid>, detail: impl Into<String>) {
        let record = AuditRecord {
            id: self.next_id(),
            action,
            booking_id,
            detail: detail.into(),
            at: Utc::now(),
        };
        if let Err(e) = self.store.save(&record).await {
            tracing::warn!(?action, error = %e, "audit append failed");
        }
    }

    /// Records in creation order (ULIDs sort by time).
    pub async fn entries(&self) -> Result<Vec<AuditRecord>, StoreError> {
        self.store.load_all::<AuditRecord>().await
    }

    pub async fn entries_for(&self, booking_id: Ulid) -> Result<Vec<AuditRecord>, StoreError> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|r| r.booking_id == Some(booking_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WalStore;

    #[tokio::test]
    async fn append_and_filter() {
        let log = AuditLog::new(Arc::new(WalStore::in_memory()));
        let booking = Ulid::new();
        log.append(AuditAction::BookingCreated, Some(booking), "created").await;
        log.append(AuditAction::LedgerRebuilt, None, "rebuild").await;
        log.append(AuditAction::BookingCancelled, Some(booking), "cancelled").await;

        assert_eq!(log.entries().await.unwrap().len(), 3);
        let mine = log.entries_for(booking).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].action, AuditAction::BookingCreated);
        assert_eq!(mine[1].action, AuditAction::BookingCancelled);
    }
}
