//! Live change feed into an ordered cart view.
//!
//! The projector subscribes to the signed-in user's cart query and, on
//! every feed event, rebuilds the whole [`CartView`] from the delivered
//! result set. Replacing instead of patching trades render cost for the
//! complete absence of merge-conflict logic; nothing here diffs.
//!
//! The subscription is the only long-lived resource in the crate. It is
//! released on every exit path: handle drop aborts the task, and a user
//! switch drops the previous feed *before* subscribing for the new user,
//! so a dangling subscription from a previous user never delivers into the
//! new user's view.

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use velvet_bean_core::{CurrencyCode, Price};

use crate::config::SyncConfig;
use crate::identity::{CurrentUser, IdentityProvider};
use crate::line_item::{CartLine, CartLineRecord};
use crate::store::{CollectionStore, Document, Filter, Subscription};

/// The locally held projection of the user's cart.
///
/// Rebuilt wholesale on every subscription event; never partially patched.
/// `total` and `item_count` are derived on each rebuild and never cached
/// independently of `lines`.
#[derive(Debug, Clone, PartialEq)]
pub struct CartView {
    /// Cart lines in store result order.
    pub lines: Vec<CartLineRecord>,
    /// Sum of unit price times quantity across all lines.
    pub total: Price,
    /// Sum of quantities across all lines (the navbar badge).
    pub item_count: u32,
}

impl CartView {
    /// An empty cart.
    #[must_use]
    pub fn empty(currency: CurrencyCode) -> Self {
        Self {
            lines: Vec::new(),
            total: Price::new(Decimal::ZERO, currency),
            item_count: 0,
        }
    }

    /// Build a view from one full result set.
    ///
    /// Rows that fail to deserialize are skipped with a warning: the
    /// projector has read-only best-effort visibility and a malformed
    /// remote row must not take the whole view down.
    #[must_use]
    pub fn from_documents(docs: Vec<Document>, currency: CurrencyCode) -> Self {
        let lines: Vec<CartLineRecord> = docs
            .into_iter()
            .filter_map(|doc| match doc.deserialize::<CartLine>() {
                Ok(line) => Some(CartLineRecord { id: doc.id, line }),
                Err(err) => {
                    warn!(id = %doc.id, %err, "skipping malformed cart document");
                    None
                }
            })
            .collect();

        let amount: Decimal = lines.iter().map(|record| record.line_total(currency)).sum();
        let item_count = lines.iter().map(|record| record.line.quantity).sum();

        Self {
            lines,
            total: Price::new(amount, currency),
            item_count,
        }
    }

    /// Whether the cart holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Handle to a running projector.
///
/// Dropping the handle tears the projector down and releases its
/// subscription.
pub struct CartViewHandle {
    rx: watch::Receiver<CartView>,
    task: JoinHandle<()>,
}

impl CartViewHandle {
    /// The current view.
    #[must_use]
    pub fn view(&self) -> CartView {
        self.rx.borrow().clone()
    }

    /// A receiver observing every view replacement.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<CartView> {
        self.rx.clone()
    }
}

impl Drop for CartViewHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Projects the store's change feed into a [`CartView`].
pub struct CartProjector;

impl CartProjector {
    /// Start projecting the signed-in user's cart.
    ///
    /// The view starts empty and tracks sign-in state: signed-out publishes
    /// an empty view immediately, and each sign-in resubscribes to that
    /// user's cart query.
    #[must_use]
    pub fn spawn<S, I>(store: S, identity: &I, config: SyncConfig) -> CartViewHandle
    where
        S: CollectionStore,
        I: IdentityProvider,
    {
        let users = identity.watch_user();
        let (tx, rx) = watch::channel(CartView::empty(config.currency));
        let task = tokio::spawn(run(store, users, tx, config));
        CartViewHandle { rx, task }
    }
}

async fn run<S: CollectionStore>(
    store: S,
    mut users: watch::Receiver<Option<CurrentUser>>,
    tx: watch::Sender<CartView>,
    config: SyncConfig,
) {
    let mut feed = resubscribe(
        &store,
        &config,
        users.borrow_and_update().clone(),
        None,
        &tx,
    );

    loop {
        tokio::select! {
            changed = users.changed() => {
                if changed.is_err() {
                    // Identity dropped; no further sign-in changes can come.
                    break;
                }
                let user = users.borrow_and_update().clone();
                feed = resubscribe(&store, &config, user, feed.take(), &tx);
            }
            event = next_event(&mut feed) => {
                match event {
                    Some(docs) => {
                        debug!(rows = docs.len(), "rebuilding cart view");
                        tx.send_replace(CartView::from_documents(docs, config.currency));
                    }
                    None => {
                        // Store closed the feed; drop it and keep serving
                        // the last view until the user changes.
                        feed = None;
                    }
                }
            }
        }
    }
}

/// Tear down `previous` and subscribe for `user`, publishing the empty view
/// on sign-out. The previous feed is dropped before the new subscription is
/// made, never after.
fn resubscribe<S: CollectionStore>(
    store: &S,
    config: &SyncConfig,
    user: Option<CurrentUser>,
    previous: Option<Subscription>,
    tx: &watch::Sender<CartView>,
) -> Option<Subscription> {
    drop(previous);

    match user {
        None => {
            tx.send_replace(CartView::empty(config.currency));
            None
        }
        Some(user) => {
            debug!(user_id = %user.id, "subscribing to cart feed");
            Some(store.subscribe(config.cart_collection.as_str(), Filter::user(user.id)))
        }
    }
}

async fn next_event(feed: &mut Option<Subscription>) -> Option<Vec<Document>> {
    match feed {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use velvet_bean_core::{Email, ProductId, RecordId, UserId};

    use crate::identity::SessionIdentity;
    use crate::store::MemoryStore;

    fn user(id: &str) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse(&format!("{id}@example.com")).unwrap(),
        }
    }

    fn cart_doc(id: &str, user: &str, product: &str, cents: i64, quantity: u32) -> Document {
        Document {
            id: RecordId::new(id),
            fields: json!({
                "userId": user,
                "productId": product,
                "name": format!("Product {product}"),
                "price": Decimal::new(cents, 2).to_string(),
                "image_url": format!("/images/{product}.png"),
                "quantity": quantity,
            }),
        }
    }

    async fn insert_line(store: &MemoryStore, user: &str, product: &str, cents: i64, qty: u32) {
        let doc = cart_doc("ignored", user, product, cents, qty);
        store.insert("cart", doc.fields).await.unwrap();
    }

    async fn next_view(rx: &mut watch::Receiver<CartView>) -> CartView {
        rx.changed().await.unwrap();
        rx.borrow_and_update().clone()
    }

    #[test]
    fn test_view_derives_total_and_count() {
        let docs = vec![
            cart_doc("a", "u1", "p1", 1450, 2),
            cart_doc("b", "u1", "p2", 500, 1),
        ];
        let view = CartView::from_documents(docs, CurrencyCode::USD);

        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.total.amount, Decimal::new(3400, 2));
        assert_eq!(view.total.to_string(), "$34.00");
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let docs = vec![
            cart_doc("a", "u1", "p1", 1450, 1),
            Document {
                id: RecordId::new("bad"),
                fields: json!({"userId": "u1", "quantity": "not-a-number"}),
            },
        ];
        let view = CartView::from_documents(docs, CurrencyCode::USD);
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.item_count, 1);
    }

    #[tokio::test]
    async fn test_feed_sequence_is_projected_in_order() {
        let store = MemoryStore::new();
        let identity = SessionIdentity::signed_in(user("u1"));
        let handle = CartProjector::spawn(store.clone(), &identity, SyncConfig::default());
        let mut rx = handle.watch();

        // Initial snapshot: empty cart, zero total.
        let view = next_view(&mut rx).await;
        assert!(view.is_empty());
        assert_eq!(view.total.amount, Decimal::ZERO);

        insert_line(&store, "u1", "p1", 1450, 1).await;
        let view = next_view(&mut rx).await;
        assert_eq!(view.item_count, 1);
        assert_eq!(view.total.amount, Decimal::new(1450, 2));

        let id = view.lines[0].id.clone();
        store.delete("cart", &id).await.unwrap();
        let view = next_view(&mut rx).await;
        assert!(view.is_empty());
        assert_eq!(view.total.amount, Decimal::ZERO);

        drop(handle);
    }

    #[tokio::test]
    async fn test_other_users_lines_never_appear() {
        let store = MemoryStore::new();
        let identity = SessionIdentity::signed_in(user("u1"));
        let handle = CartProjector::spawn(store.clone(), &identity, SyncConfig::default());
        let mut rx = handle.watch();

        let view = next_view(&mut rx).await;
        assert!(view.is_empty());

        // A write to another user's cart re-delivers u1's (still empty)
        // result set.
        insert_line(&store, "u2", "p1", 1450, 5).await;
        let view = next_view(&mut rx).await;
        assert_eq!(view.item_count, 0);

        insert_line(&store, "u1", "p2", 500, 1).await;
        let view = next_view(&mut rx).await;
        assert_eq!(view.item_count, 1);
        assert_eq!(view.lines[0].line.product_id, ProductId::new("p2"));
    }

    #[tokio::test]
    async fn test_sign_out_empties_view() {
        let store = MemoryStore::new();
        insert_line(&store, "u1", "p1", 1450, 2).await;

        let identity = SessionIdentity::signed_in(user("u1"));
        let handle = CartProjector::spawn(store.clone(), &identity, SyncConfig::default());
        let mut rx = handle.watch();

        let view = next_view(&mut rx).await;
        assert_eq!(view.item_count, 2);

        identity.sign_out();
        let view = next_view(&mut rx).await;
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn test_user_switch_resubscribes_without_cross_delivery() {
        let store = MemoryStore::new();
        insert_line(&store, "alice", "p1", 1450, 3).await;
        insert_line(&store, "bob", "p2", 500, 1).await;

        let identity = SessionIdentity::signed_in(user("alice"));
        let handle = CartProjector::spawn(store.clone(), &identity, SyncConfig::default());
        let mut rx = handle.watch();

        let view = next_view(&mut rx).await;
        assert_eq!(view.item_count, 3);

        identity.sign_in(user("bob"));
        let view = next_view(&mut rx).await;
        assert_eq!(view.item_count, 1);
        assert_eq!(view.lines[0].line.user_id, UserId::new("bob"));

        // A write to alice's cart after the switch must not reach the view.
        insert_line(&store, "alice", "p3", 100, 1).await;
        insert_line(&store, "bob", "p4", 200, 2).await;
        let view = next_view(&mut rx).await;
        assert_eq!(view.item_count, 3);
        assert!(view.lines.iter().all(|r| r.line.user_id == UserId::new("bob")));
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let store = MemoryStore::new();
        let identity = SessionIdentity::signed_in(user("u1"));
        let handle = CartProjector::spawn(store.clone(), &identity, SyncConfig::default());

        // Let the task register its subscription.
        tokio::task::yield_now().await;
        drop(handle);
        tokio::task::yield_now().await;

        // Writes after teardown go nowhere; nothing panics on the closed
        // channel and the store forgets the subscriber.
        insert_line(&store, "u1", "p1", 1450, 1).await;
        assert_eq!(store.len("cart"), 1);
    }
}
