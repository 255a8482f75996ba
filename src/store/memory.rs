// store/memory.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use super::{Document, Filter, StoreClient, StoreError, Subscription};

struct Listener {
    id: u64,
    collection: String,
    filter: Filter,
    tx: watch::Sender<Vec<Document>>,
}

struct Inner {
    collections: HashMap<String, Vec<Document>>,
    listeners: Vec<Listener>,
    next_listener_id: u64,
    last_commit: Option<DateTime<Utc>>,
    offline: bool,
    fail_appends: bool,
}

/// In-process store backend with the same contract the remote store gives
/// us: at-least-once snapshot delivery, commit order within a subscription,
/// no ordering across subscriptions, single-document compare-and-set.
///
/// Backs the demo binary and every test. `set_offline` simulates an outage:
/// calls start failing with `Unavailable` and open change feeds are torn
/// down, which is exactly how consumers observe a lost connection.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Arc::new(Mutex::new(Inner {
                collections: HashMap::new(),
                listeners: Vec::new(),
                next_listener_id: 0,
                last_commit: None,
                offline: false,
                fail_appends: false,
            })),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.offline = offline;
            if offline {
                // Dropping the senders closes every feed; subscribers see
                // end-of-stream and must re-establish explicitly.
                inner.listeners.clear();
            }
        }
    }

    /// Partial outage: `append` fails while reads, compare-and-set and open
    /// feeds keep working. Models the original store rejecting a single
    /// write mid-flow rather than the connection dropping outright.
    pub fn fail_appends(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_appends = fail;
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store state poisoned".to_string()))
    }
}

impl Inner {
    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            Err(StoreError::Unavailable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    /// Store-assigned commit time, strictly increasing so that message
    /// timestamps order deterministically even within one millisecond.
    fn next_commit_time(&mut self) -> DateTime<Utc> {
        let mut commit = Utc::now();
        if let Some(last) = self.last_commit {
            if commit <= last {
                commit = last + Duration::milliseconds(1);
            }
        }
        self.last_commit = Some(commit);
        commit
    }

    /// Fan a fresh snapshot out to every listener on `collection`. Runs
    /// under the state lock, so per-listener snapshots are published in
    /// commit order; the watch channel coalesces for slow readers, whose
    /// next read is always the latest snapshot.
    fn notify(&mut self, collection: &str) {
        let docs = self
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default();
        self.listeners.retain(|listener| {
            if listener.collection != collection {
                return true;
            }
            let snapshot: Vec<Document> = docs
                .iter()
                .filter(|d| listener.filter.matches(d))
                .cloned()
                .collect();
            listener.tx.send(snapshot).is_ok()
        });
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn append(&self, collection: &str, mut fields: Value) -> Result<Document, StoreError> {
        let mut inner = self.lock()?;
        inner.check_online()?;
        if inner.fail_appends {
            return Err(StoreError::Unavailable("store rejected the write".to_string()));
        }
        let commit = inner.next_commit_time();
        if let Some(map) = fields.as_object_mut() {
            // Server-timestamp sentinel.
            if matches!(map.get("timestamp"), Some(Value::Null)) {
                map.insert("timestamp".to_string(), Value::from(commit.to_rfc3339()));
            }
        }
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            fields,
        };
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        inner.notify(collection);
        Ok(doc)
    }

    async fn get_once(&self, collection: &str, filter: Filter) -> Result<Vec<Document>, StoreError> {
        let inner = self.lock()?;
        inner.check_online()?;
        Ok(inner
            .collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.lock()?;
        inner.check_online()?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn conditional_update(
        &self,
        collection: &str,
        id: &str,
        expected: Value,
        updates: Value,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        inner.check_online()?;
        let null = Value::Null;
        let applied = match inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
        {
            None => false,
            Some(doc) => {
                let matches = expected
                    .as_object()
                    .map(|exp| {
                        exp.iter()
                            .all(|(field, want)| doc.fields.get(field).unwrap_or(&null) == want)
                    })
                    .unwrap_or(true);
                if matches {
                    if let (Some(target), Some(changes)) =
                        (doc.fields.as_object_mut(), updates.as_object())
                    {
                        for (field, value) in changes {
                            target.insert(field.clone(), value.clone());
                        }
                    }
                }
                matches
            }
        };
        if applied {
            inner.notify(collection);
        }
        Ok(applied)
    }

    async fn subscribe(&self, collection: &str, filter: Filter) -> Result<Subscription, StoreError> {
        let mut inner = self.lock()?;
        inner.check_online()?;
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;

        // Initial snapshot before any future commit can interleave; marking
        // it unseen makes the first `recv` return it.
        let snapshot: Vec<Document> = inner
            .collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default();
        let (tx, mut rx) = watch::channel(snapshot);
        rx.mark_changed();

        inner.listeners.push(Listener {
            id,
            collection: collection.to_string(),
            filter,
            tx,
        });

        let state = Arc::clone(&self.inner);
        let canceller = Arc::new(move || {
            if let Ok(mut inner) = state.lock() {
                inner.listeners.retain(|l| l.id != id);
            }
        });
        Ok(Subscription::new(rx, canceller))
    }
}
