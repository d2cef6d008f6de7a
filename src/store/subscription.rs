use std::marker::PhantomData;
use std::sync::Arc;

use futures::Stream;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::notify::ChangeNotice;

use super::{DocumentStore, RangeQuery, Record, RecordStore, StoreError};

/// Live view of a range query. Every change delivers the full current
/// result set, not a delta.
pub struct Subscription<R> {
    store: Arc<dyn DocumentStore>,
    query: RangeQuery,
    changes: broadcast::Receiver<ChangeNotice>,
    primed: bool,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Subscription<R> {
    pub fn new(store: Arc<dyn DocumentStore>, query: RangeQuery) -> Self {
        let changes = store.subscribe(R::COLLECTION);
        Self {
            store,
            query,
            changes,
            primed: false,
            _record: PhantomData,
        }
    }

    /// The first call returns the current result set immediately; later
    /// calls wait for a relevant change. `None` once the store shuts down.
    pub async fn next(&mut self) -> Option<Result<Vec<R>, StoreError>> {
        if self.primed {
            loop {
                match self.changes.recv().await {
                    Ok(notice) if self.is_relevant(&notice) => break,
                    Ok(_) => continue,
                    // Missed notices: the snapshot below covers them.
                    Err(RecvError::Lagged(_)) => break,
                    Err(RecvError::Closed) => return None,
                }
            }
            self.drain_pending();
        }
        self.primed = true;
        Some(self.store.query::<R>(&self.query).await)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<R>, StoreError>> {
        futures::stream::unfold(self, |mut sub| async move {
            let item = sub.next().await?;
            Some((item, sub))
        })
    }

    fn is_relevant(&self, notice: &ChangeNotice) -> bool {
        if self.query.is_key_range() || self.query.field == R::KEY_FIELD {
            self.query.contains(&Value::String(notice.id.clone()))
        } else {
            true
        }
    }

    /// Coalesce notices that queued up while the caller was busy.
    fn drain_pending(&mut self) {
        loop {
            match self.changes.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }
}
