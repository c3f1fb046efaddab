//! Remote document store capability.
//!
//! # Architecture
//!
//! The backend is an opaque document store keyed by collection name. The
//! core consumes exactly five capabilities: point/filtered reads, inserts,
//! field updates, deletes, and a live subscription that re-delivers the
//! full matching result set on every change. No transaction wraps a
//! query+write pair; the reconciler is built around that absence.
//!
//! Documents cross this boundary as untyped JSON field maps. Typed structs
//! live one layer up (see [`crate::line_item`]) and deserialize through
//! [`Document::deserialize`].

mod memory;

pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use velvet_bean_core::{ProductId, RecordId, UserId};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Transient network/availability failure. The operation may succeed if
    /// re-triggered.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the operation (constraint or schema violation).
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// A stored document: a store-assigned id plus an untyped field map.
#[derive(Debug, Clone)]
pub struct Document {
    /// Store-assigned record id. Opaque, stable once created.
    pub id: RecordId,
    /// Document fields as a JSON object.
    pub fields: Value,
}

impl Document {
    /// Deserialize the field map into a typed document.
    ///
    /// # Errors
    ///
    /// Returns an error if the fields do not match the target shape.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.fields.clone())
    }
}

/// Equality filter over the two fields the core queries by.
///
/// Matches documents whose `userId` equals the given user and, when a
/// product is given, whose `productId` equals it as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    user_id: UserId,
    product_id: Option<ProductId>,
}

impl Filter {
    /// All documents belonging to a user.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            product_id: None,
        }
    }

    /// The (at most one) document for a (user, product) pair.
    #[must_use]
    pub const fn key(user_id: UserId, product_id: ProductId) -> Self {
        Self {
            user_id,
            product_id: Some(product_id),
        }
    }

    /// Whether a document's field map satisfies this filter.
    #[must_use]
    pub fn matches(&self, fields: &Value) -> bool {
        let user_matches = fields
            .get("userId")
            .and_then(Value::as_str)
            .is_some_and(|v| v == self.user_id.as_str());

        let product_matches = self.product_id.as_ref().is_none_or(|product_id| {
            fields
                .get("productId")
                .and_then(Value::as_str)
                .is_some_and(|v| v == product_id.as_str())
        });

        user_matches && product_matches
    }
}

/// A live subscription to a filtered query.
///
/// Each received event is the complete current result set, not a diff.
/// Dropping the subscription unsubscribes deterministically.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Vec<Document>>,
    _guard: UnsubscribeGuard,
}

impl Subscription {
    /// Build a subscription from an event channel and an unsubscribe hook
    /// to run on drop.
    #[must_use]
    pub fn new(
        rx: mpsc::UnboundedReceiver<Vec<Document>>,
        on_unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            _guard: UnsubscribeGuard(Some(Box::new(on_unsubscribe))),
        }
    }

    /// Receive the next full result set. Returns `None` once the feed is
    /// closed by the store.
    pub async fn recv(&mut self) -> Option<Vec<Document>> {
        self.rx.recv().await
    }
}

struct UnsubscribeGuard(Option<Box<dyn FnOnce() + Send>>);

impl Drop for UnsubscribeGuard {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.0.take() {
            unsubscribe();
        }
    }
}

/// The document store capability consumed by the synchronization core.
///
/// Write operations are one-shot RPCs with no ordering guarantees between
/// independent calls. `subscribe` registers immediately and delivers the
/// current result set as its first event.
pub trait CollectionStore: Send + Sync + 'static {
    /// Documents matching an equality filter.
    fn query(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    /// Insert a new document; the store assigns and returns the record id.
    fn insert(
        &self,
        collection: &str,
        fields: Value,
    ) -> impl Future<Output = Result<RecordId, StoreError>> + Send;

    /// Merge `partial` into an existing document's top-level fields.
    fn update_fields(
        &self,
        collection: &str,
        id: &RecordId,
        partial: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a document. Deleting an id that no longer exists is a no-op.
    fn delete(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Subscribe to a filtered query. The first event is the current result
    /// set; every subsequent write anywhere in the collection that changes
    /// the result re-delivers it in full.
    fn subscribe(&self, collection: &str, filter: Filter) -> Subscription;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches_user() {
        let filter = Filter::user(UserId::new("u1"));
        assert!(filter.matches(&json!({"userId": "u1", "productId": "p1"})));
        assert!(!filter.matches(&json!({"userId": "u2", "productId": "p1"})));
        assert!(!filter.matches(&json!({"productId": "p1"})));
    }

    #[test]
    fn test_filter_matches_key() {
        let filter = Filter::key(UserId::new("u1"), ProductId::new("p1"));
        assert!(filter.matches(&json!({"userId": "u1", "productId": "p1"})));
        assert!(!filter.matches(&json!({"userId": "u1", "productId": "p2"})));
        assert!(!filter.matches(&json!({"userId": "u2", "productId": "p1"})));
    }

    #[test]
    fn test_document_deserialize() {
        #[derive(serde::Deserialize)]
        struct Probe {
            quantity: u32,
        }

        let doc = Document {
            id: RecordId::new("r1"),
            fields: json!({"quantity": 2}),
        };
        let probe: Probe = doc.deserialize().unwrap();
        assert_eq!(probe.quantity, 2);

        let bad = Document {
            id: RecordId::new("r2"),
            fields: json!({"quantity": "two"}),
        };
        assert!(bad.deserialize::<Probe>().is_err());
    }
}
