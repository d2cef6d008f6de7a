use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::model::{Collection, Event};
use crate::notify::{ChangeKind, ChangeNotice, NotifyHub};
use crate::wal::Wal;

use super::{Document, DocumentStore, RangeQuery, StoreError};

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

/// A mutation waiting for its batch to be flushed.
struct PendingWrite {
    event: Event,
    /// Parsed body for puts; `None` for deletes.
    body: Option<Value>,
    response: Reply<()>,
}

enum WalCommand {
    Append(PendingWrite),
    Compact { response: Reply<()> },
    AppendsSinceCompact { response: oneshot::Sender<u64> },
}

/// Document contents plus the hub that announces changes to them.
struct Shared {
    docs: DashMap<Collection, BTreeMap<String, Value>>,
    notify: NotifyHub,
}

impl Shared {
    fn new() -> Self {
        Self {
            docs: DashMap::new(),
            notify: NotifyHub::new(),
        }
    }

    fn apply(&self, event: &Event, body: Option<Value>) {
        let kind = match (event, body) {
            (Event::Put { collection, id, .. }, Some(body)) => {
                self.docs.entry(*collection).or_default().insert(id.clone(), body);
                ChangeKind::Put
            }
            (Event::Delete { collection, id }, _) => {
                if let Some(mut docs) = self.docs.get_mut(collection) {
                    docs.remove(id);
                }
                ChangeKind::Delete
            }
            (Event::Put { .. }, None) => unreachable!("put without a body"),
        };
        self.notify.send(ChangeNotice {
            collection: event.collection(),
            id: event.id().to_string(),
            kind,
        });
    }

    fn contains(&self, collection: Collection, id: &str) -> bool {
        self.docs
            .get(&collection)
            .is_some_and(|docs| docs.contains_key(id))
    }

    /// One `Put` per live document, enough to rebuild current state.
    fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for collection in Collection::ALL {
            if let Some(docs) = self.docs.get(&collection) {
                for (id, body) in docs.iter() {
                    events.push(Event::Put {
                        collection,
                        id: id.clone(),
                        body: body.to_string(),
                    });
                }
            }
        }
        events
    }
}

/// Background task that owns the WAL. Appends are batched for group commit,
/// and each batch is applied to memory only after it is durable, in log order.
async fn wal_writer_loop(mut wal: Wal, shared: Arc<Shared>, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append(write) => {
                let mut batch = vec![write];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append(write)) => batch.push(write),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                commit_batch(&mut wal, &shared, batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, &shared, other);
                }
            }
            other => handle_non_append(&mut wal, &shared, other),
        }
    }
    debug!(path = %wal.path().display(), "WAL writer stopped");
}

fn commit_batch(wal: &mut Wal, shared: &Shared, batch: Vec<PendingWrite>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();
    let result = flush_batch(wal, &batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(()) => {
            for write in batch {
                shared.apply(&write.event, write.body);
                let _ = write.response.send(Ok(()));
            }
        }
        Err(e) => {
            tracing::error!(error = %e, records = batch.len(), "WAL flush failed");
            for write in batch {
                let _ = write.response.send(Err(StoreError::Io(e.to_string())));
            }
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingWrite]) -> io::Result<()> {
    let mut append_err = None;
    for write in batch {
        if let Err(e) = wal.append_buffered(&write.event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so partial bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, shared: &Shared, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { response } => {
            let events = shared.snapshot_events();
            let result = wal
                .compact(&events)
                .map_err(|e| StoreError::Io(e.to_string()));
            if result.is_ok() {
                info!(records = events.len(), "WAL compacted");
            }
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append(_) => unreachable!(),
    }
}

/// In-memory document store made durable by a write-ahead log.
///
/// Reads never touch the log. Writes go through a single writer task, so
/// memory always reflects a prefix of the log.
pub struct WalStore {
    shared: Arc<Shared>,
    wal_tx: Option<mpsc::Sender<WalCommand>>,
}

impl WalStore {
    /// Replay `path` and start the writer task. Must run inside a Tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let shared = Arc::new(Shared::new());
        for event in &events {
            let body = match event {
                Event::Put { body, collection, id } => Some(serde_json::from_str(body).map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("WAL record {collection}/{id}: {e}"),
                    )
                })?),
                Event::Delete { .. } => None,
            };
            shared.apply(event, body);
        }
        info!(path = %path.display(), records = events.len(), "store replayed");

        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, shared.clone(), wal_rx));

        Ok(Self {
            shared,
            wal_tx: Some(wal_tx),
        })
    }

    /// A store with no log; contents vanish with the process.
    pub fn in_memory() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            wal_tx: None,
        }
    }

    async fn write(&self, event: Event, body: Option<Value>) -> Result<(), StoreError> {
        let Some(wal_tx) = &self.wal_tx else {
            self.shared.apply(&event, body);
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Append(PendingWrite {
                event,
                body,
                response: tx,
            }))
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }

    /// Rewrite the log from current contents.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Compact { response: tx })
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let Some(wal_tx) = &self.wal_tx else {
            return 0;
        };
        let (tx, rx) = oneshot::channel();
        if wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for WalStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.shared.docs.get(&collection).and_then(|docs| {
            docs.get(id).map(|body| Document {
                id: id.to_string(),
                body: body.clone(),
            })
        }))
    }

    async fn put(&self, collection: Collection, id: &str, body: Value) -> Result<(), StoreError> {
        let event = Event::Put {
            collection,
            id: id.to_string(),
            body: body.to_string(),
        };
        self.write(event, Some(body)).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        if !self.shared.contains(collection, id) {
            return Ok(false);
        }
        let event = Event::Delete {
            collection,
            id: id.to_string(),
        };
        self.write(event, None).await?;
        Ok(true)
    }

    async fn query_range(
        &self,
        collection: Collection,
        query: &RangeQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let Some(docs) = self.shared.docs.get(&collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|(id, body)| query.matches(id, body))
            .map(|(id, body)| Document {
                id: id.clone(),
                body: body.clone(),
            })
            .collect())
    }

    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeNotice> {
        self.shared.notify.subscribe(collection)
    }
}
