//! In-memory document store with live query subscriptions.
//!
//! Reference implementation of [`CollectionStore`] used by tests and local
//! development. Behavior mirrors the production backend where it matters to
//! the core: store-assigned opaque record ids, top-level field merge on
//! update, idempotent delete, and a full-replace change feed that re-runs
//! every live query after each successful write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;
use velvet_bean_core::RecordId;

use super::{CollectionStore, Document, Filter, StoreError, Subscription};

/// Cheaply cloneable handle to a shared in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<Document>>,
    subscribers: Vec<Subscriber>,
    next_subscriber_id: u64,
    fail_next: Option<StoreError>,
}

struct Subscriber {
    id: u64,
    collection: String,
    filter: Filter,
    tx: mpsc::UnboundedSender<Vec<Document>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next store operation fail with the given error.
    ///
    /// Used by tests to exercise error paths; the failure consumes itself,
    /// so the operation after it behaves normally again.
    pub fn fail_next(&self, err: StoreError) {
        self.lock().fail_next = Some(err);
    }

    /// Number of documents currently stored in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Whether a collection holds no documents.
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning cannot happen: no code path panics while holding
        // the guard.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn take_injected_fault(inner: &mut Inner) -> Result<(), StoreError> {
        match inner.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Inner {
    /// Push the current result set of every live query on `collection`.
    fn notify(&mut self, collection: &str) {
        let docs = self.collections.get(collection).cloned().unwrap_or_default();
        self.subscribers.retain(|sub| {
            if sub.collection != collection {
                return true;
            }
            let matching: Vec<Document> = docs
                .iter()
                .filter(|doc| sub.filter.matches(&doc.fields))
                .cloned()
                .collect();
            // A closed receiver means the subscription was dropped; forget it.
            sub.tx.send(matching).is_ok()
        });
    }
}

impl CollectionStore for MemoryStore {
    async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let mut inner = self.lock();
        Self::take_injected_fault(&mut inner)?;

        Ok(inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(&doc.fields))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, fields: Value) -> Result<RecordId, StoreError> {
        if !fields.is_object() {
            return Err(StoreError::Rejected(
                "document fields must be an object".to_string(),
            ));
        }

        let mut inner = self.lock();
        Self::take_injected_fault(&mut inner)?;

        let id = RecordId::new(Uuid::new_v4().to_string());
        debug!(%id, collection, "inserting document");
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Document {
                id: id.clone(),
                fields,
            });
        inner.notify(collection);
        Ok(id)
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &RecordId,
        partial: Value,
    ) -> Result<(), StoreError> {
        let Value::Object(partial) = partial else {
            return Err(StoreError::Rejected(
                "partial fields must be an object".to_string(),
            ));
        };

        let mut inner = self.lock();
        Self::take_injected_fault(&mut inner)?;

        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| &doc.id == id))
            .ok_or_else(|| StoreError::Rejected(format!("no such record: {id}")))?;

        if let Value::Object(fields) = &mut doc.fields {
            for (key, value) in partial {
                fields.insert(key, value);
            }
        }
        debug!(%id, collection, "updated document fields");
        inner.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        Self::take_injected_fault(&mut inner)?;

        let removed = inner
            .collections
            .get_mut(collection)
            .is_some_and(|docs| {
                let before = docs.len();
                docs.retain(|doc| &doc.id != id);
                docs.len() != before
            });

        if removed {
            debug!(%id, collection, "deleted document");
            inner.notify(collection);
        }
        Ok(())
    }

    fn subscribe(&self, collection: &str, filter: Filter) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        let subscriber_id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;

        // Initial snapshot: the feed always starts from the current state.
        let initial: Vec<Document> = inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(&doc.fields))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let _ = tx.send(initial);

        inner.subscribers.push(Subscriber {
            id: subscriber_id,
            collection: collection.to_string(),
            filter,
            tx,
        });
        drop(inner);

        let registry = Arc::clone(&self.inner);
        Subscription::new(rx, move || {
            let mut inner = registry
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.subscribers.retain(|sub| sub.id != subscriber_id);
        })
    }
}
