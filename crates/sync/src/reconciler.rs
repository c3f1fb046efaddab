//! Uniqueness-preserving upsert/delete engine.
//!
//! Every mutation is a query-then-write sequence: read the (user, product)
//! key's current record set, plan a single write from what was observed,
//! issue it, and report the outcome to the notification slot exactly once.
//!
//! # Consistency
//!
//! No transaction wraps the query and the write. Two concurrent calls for
//! the same key can both observe "no existing record" and both insert,
//! producing a duplicate; two rapid increments can interleave their
//! query/write pairs and lose an update. This is an accepted limitation of
//! the backend's capability set, documented rather than hidden. The
//! [`MutationGate`] narrows the window for a single UI entry point; entry
//! points that share no gate can still race, and each tab's live view
//! independently converges to the server state after a race settles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;
use tracing::{instrument, warn};
use velvet_bean_core::{ProductId, RecordId, UserId};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::identity::IdentityProvider;
use crate::line_item::{CartLine, ProductSummary};
use crate::notify::Notifier;
use crate::quantity::{self, LineState, WritePlan};
use crate::store::{CollectionStore, Document, Filter};

/// User-facing copy for mutation outcomes.
mod messages {
    pub const LOGIN_CART: &str = "Please log in to add items to cart";
    pub const LOGIN_WISHLIST: &str = "Please log in to manage your wishlist";
    pub const CART_ADDED: &str = "Item added to cart successfully";
    pub const CART_UPDATED: &str = "Cart updated successfully";
    pub const CART_REMOVED: &str = "Item removed from cart";
    pub const CART_ADD_FAILED: &str = "Error adding item to cart";
    pub const CART_UPDATE_FAILED: &str = "Error updating cart";
    pub const CART_REMOVE_FAILED: &str = "Error removing item";
    pub const WISHLIST_ADDED: &str = "Item added to wishlist";
    pub const WISHLIST_REMOVED: &str = "Item removed from wishlist";
    pub const WISHLIST_FAILED: &str = "Error updating wishlist";
}

/// Busy flag for one mutation entry point.
///
/// An entry point (e.g., the cart drawer) holds a gate and refuses to start
/// a mutation while a previous one it issued is still in flight. Gates are
/// per-entry-point: two entry points holding different gates can still
/// interleave.
#[derive(Clone, Default)]
pub struct MutationGate {
    busy: Arc<AtomicBool>,
}

impl MutationGate {
    /// Create an idle gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate for one mutation. Returns `None` while a previous
    /// permit from this gate is still alive.
    #[must_use]
    pub fn try_begin(&self) -> Option<MutationPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| MutationPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Whether a mutation from this gate is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// RAII permit released when the mutation completes (on every exit path).
pub struct MutationPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for MutationPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// The write engine for the cart and wishlist collections.
///
/// Exclusively owns write access; the projector has read-only best-effort
/// visibility through the store's change feed.
pub struct Reconciler<S, I> {
    store: S,
    identity: I,
    notifier: Notifier,
    config: SyncConfig,
}

impl<S, I> Reconciler<S, I>
where
    S: CollectionStore,
    I: IdentityProvider,
{
    /// Create a reconciler over explicit collaborators.
    #[must_use]
    pub const fn new(store: S, identity: I, notifier: Notifier, config: SyncConfig) -> Self {
        Self {
            store,
            identity,
            notifier,
            config,
        }
    }

    /// The notifier this reconciler reports through.
    #[must_use]
    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Add one unit of `product` to the signed-in user's cart.
    ///
    /// # Errors
    ///
    /// See [`upsert_or_increment`](Self::upsert_or_increment).
    pub async fn add_to_cart(&self, product: &ProductSummary) -> Result<()> {
        self.upsert_or_increment(product, 1).await
    }

    /// Apply `delta` to the cart line for (signed-in user, `product`).
    ///
    /// Queries the cart collection for the key, plans a transition from the
    /// observed state, and issues exactly one write (or none when there is
    /// nothing to do). Reports the outcome to the notification slot once.
    ///
    /// # Errors
    ///
    /// - [`SyncError::AuthRequired`] with no signed-in user
    /// - [`SyncError::StoreUnavailable`] / [`SyncError::StoreWriteRejected`]
    ///   from the store, already reported as an error notice
    /// - [`SyncError::InvariantViolation`] if the observed state is
    ///   unrepresentable; nothing was written
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn upsert_or_increment(&self, product: &ProductSummary, delta: i64) -> Result<()> {
        let Some(user) = self.identity.current_user() else {
            self.notifier.error(messages::LOGIN_CART);
            return Err(SyncError::AuthRequired);
        };

        let result = self.apply_cart_delta(user.id, product, delta).await;
        match &result {
            Ok(plan) => self.notifier.success(cart_success_message(*plan, delta)),
            Err(err) => {
                warn!(%err, "cart mutation failed");
                self.notifier.error(cart_error_message(delta));
            }
        }
        result.map(|_| ())
    }

    async fn apply_cart_delta(
        &self,
        user_id: UserId,
        product: &ProductSummary,
        delta: i64,
    ) -> Result<WritePlan> {
        let collection = self.config.cart_collection.as_str();
        let filter = Filter::key(user_id.clone(), product.id.clone());
        let existing = self.store.query(collection, &filter).await?;

        // Duplicates are a known race artifact; operate on the first record
        // and let the feed surface whatever remains.
        let observed = match existing.first() {
            None => LineState::Absent,
            Some(doc) => LineState::Present(doc.deserialize::<CartLine>()?.quantity),
        };

        let plan = quantity::plan(observed, delta)?;
        match (plan, existing.first()) {
            (WritePlan::Insert(q), _) => {
                let line = product.cart_line(user_id, q);
                let fields = serde_json::to_value(&line)?;
                self.store.insert(collection, fields).await?;
            }
            (WritePlan::Update(q), Some(doc)) => {
                self.store
                    .update_fields(collection, &doc.id, json!({ "quantity": q }))
                    .await?;
            }
            (WritePlan::Delete, Some(doc)) => {
                self.store.delete(collection, &doc.id).await?;
            }
            (WritePlan::Noop, _) => {}
            (WritePlan::Update(_) | WritePlan::Delete, None) => {
                // plan() only returns these for an observed record.
                return Err(SyncError::InvariantViolation(
                    "planned a write against a record that was not observed".to_string(),
                ));
            }
        }
        Ok(plan)
    }

    /// Set a cart line's quantity directly (cart drawer stepper).
    ///
    /// A quantity of zero deletes the record; it is never stored at zero.
    ///
    /// # Errors
    ///
    /// As [`upsert_or_increment`](Self::upsert_or_increment).
    #[instrument(skip(self))]
    pub async fn set_quantity(&self, record_id: &RecordId, new_quantity: u32) -> Result<()> {
        if self.identity.current_user().is_none() {
            self.notifier.error(messages::LOGIN_CART);
            return Err(SyncError::AuthRequired);
        }

        if new_quantity == 0 {
            return self.remove_line(record_id).await;
        }

        let result = self
            .store
            .update_fields(
                self.config.cart_collection.as_str(),
                record_id,
                json!({ "quantity": new_quantity }),
            )
            .await;
        match result {
            Ok(()) => {
                self.notifier.success(messages::CART_UPDATED);
                Ok(())
            }
            Err(err) => {
                warn!(%err, %record_id, "quantity update failed");
                self.notifier.error(messages::CART_UPDATE_FAILED);
                Err(err.into())
            }
        }
    }

    /// Remove a cart line outright (trash-can button).
    ///
    /// # Errors
    ///
    /// As [`upsert_or_increment`](Self::upsert_or_increment).
    #[instrument(skip(self))]
    pub async fn remove_line(&self, record_id: &RecordId) -> Result<()> {
        if self.identity.current_user().is_none() {
            self.notifier.error(messages::LOGIN_CART);
            return Err(SyncError::AuthRequired);
        }

        let result = self
            .store
            .delete(self.config.cart_collection.as_str(), record_id)
            .await;
        match result {
            Ok(()) => {
                self.notifier.success(messages::CART_REMOVED);
                Ok(())
            }
            Err(err) => {
                warn!(%err, %record_id, "cart line removal failed");
                self.notifier.error(messages::CART_REMOVE_FAILED);
                Err(err.into())
            }
        }
    }

    /// Toggle `product`'s wishlist membership for the signed-in user.
    ///
    /// Absent inserts a presence record; present deletes it unconditionally.
    /// Returns the new membership.
    ///
    /// # Errors
    ///
    /// As [`upsert_or_increment`](Self::upsert_or_increment).
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn toggle_wishlist(&self, product: &ProductSummary) -> Result<bool> {
        let Some(user) = self.identity.current_user() else {
            self.notifier.error(messages::LOGIN_WISHLIST);
            return Err(SyncError::AuthRequired);
        };

        let result = self.apply_wishlist_toggle(user.id, product).await;
        match &result {
            Ok(true) => self.notifier.success(messages::WISHLIST_ADDED),
            Ok(false) => self.notifier.success(messages::WISHLIST_REMOVED),
            Err(err) => {
                warn!(%err, "wishlist toggle failed");
                self.notifier.error(messages::WISHLIST_FAILED);
            }
        }
        result
    }

    async fn apply_wishlist_toggle(
        &self,
        user_id: UserId,
        product: &ProductSummary,
    ) -> Result<bool> {
        let collection = self.config.wishlist_collection.as_str();
        let filter = Filter::key(user_id.clone(), product.id.clone());
        let existing = self.store.query(collection, &filter).await?;

        match existing.first() {
            None => {
                let entry = product.wishlist_entry(user_id);
                let fields = serde_json::to_value(&entry)?;
                self.store.insert(collection, fields).await?;
                Ok(true)
            }
            Some(Document { id, .. }) => {
                self.store.delete(collection, id).await?;
                Ok(false)
            }
        }
    }

    /// Whether `product` is in the signed-in user's wishlist.
    ///
    /// Point query evaluated per call; membership is not kept live, so a
    /// toggle performed elsewhere is invisible until the caller re-queries.
    /// With no signed-in user the answer is `false`.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails. Reads do not notify.
    pub async fn is_wishlisted(&self, product_id: &ProductId) -> Result<bool> {
        let Some(user) = self.identity.current_user() else {
            return Ok(false);
        };

        let filter = Filter::key(user.id, product_id.clone());
        let existing = self
            .store
            .query(self.config.wishlist_collection.as_str(), &filter)
            .await?;
        Ok(!existing.is_empty())
    }
}

const fn cart_success_message(plan: WritePlan, delta: i64) -> &'static str {
    match plan {
        WritePlan::Insert(_) => messages::CART_ADDED,
        WritePlan::Update(_) => {
            if delta > 0 {
                messages::CART_ADDED
            } else {
                messages::CART_UPDATED
            }
        }
        WritePlan::Delete | WritePlan::Noop => messages::CART_REMOVED,
    }
}

const fn cart_error_message(delta: i64) -> &'static str {
    if delta > 0 {
        messages::CART_ADD_FAILED
    } else {
        messages::CART_UPDATE_FAILED
    }
}
