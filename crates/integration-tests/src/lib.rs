//! Integration tests for Velvet Bean.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p velvet-bean-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_flow` - Query-then-write cart reconciliation
//! - `wishlist_flow` - Wishlist toggle and membership
//! - `live_view` - Change feed projection and identity switches
//! - `notifications` - Single-slot status message behavior
//!
//! All scenarios run against the in-memory store; no external services.

use std::sync::Once;
use std::time::Duration;

use rust_decimal::Decimal;
use velvet_bean_core::{Email, ProductId, UserId};
use velvet_bean_sync::{
    CurrentUser, MemoryStore, Notifier, ProductSummary, Reconciler, SessionIdentity, SyncConfig,
};

static TRACING: Once = Once::new();

/// Initialize test logging once per process. Respects `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Everything a scenario needs, wired over one shared in-memory store.
pub struct TestContext {
    pub store: MemoryStore,
    pub identity: SessionIdentity,
    pub reconciler: Reconciler<MemoryStore, SessionIdentity>,
    pub config: SyncConfig,
}

impl TestContext {
    /// Context with a signed-in user.
    #[must_use]
    pub fn signed_in(user_id: &str) -> Self {
        Self::build(SessionIdentity::signed_in(test_user(user_id)))
    }

    /// Context with no signed-in user.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::build(SessionIdentity::new())
    }

    fn build(identity: SessionIdentity) -> Self {
        init_tracing();
        let config = SyncConfig::default();
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(
            store.clone(),
            identity.clone(),
            Notifier::new(config.notice_ttl),
            config.clone(),
        );
        Self {
            store,
            identity,
            reconciler,
            config,
        }
    }

    /// A second reconciler over the same store, signed in as another user.
    ///
    /// Models a different browser session sharing the remote collections.
    #[must_use]
    pub fn reconciler_for(&self, user_id: &str) -> Reconciler<MemoryStore, SessionIdentity> {
        Reconciler::new(
            self.store.clone(),
            SessionIdentity::signed_in(test_user(user_id)),
            Notifier::new(self.config.notice_ttl),
            self.config.clone(),
        )
    }

    /// Text of the currently visible notice, if any.
    #[must_use]
    pub fn notice_text(&self) -> Option<String> {
        self.reconciler.notifier().current().map(|n| n.text)
    }
}

/// A fixed identity for tests.
#[must_use]
pub fn test_user(id: &str) -> CurrentUser {
    CurrentUser {
        id: UserId::new(id),
        email: Email::parse(&format!("{id}@example.com")).expect("valid test email"),
    }
}

/// A product fixture priced in cents.
#[must_use]
pub fn test_product(id: &str, cents: i64) -> ProductSummary {
    ProductSummary {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        price: Decimal::new(cents, 2),
        image_url: format!("/images/{id}.png"),
    }
}

/// Default notification TTL used by scenarios that exercise timers.
#[must_use]
pub const fn notice_ttl() -> Duration {
    Duration::from_secs(3)
}
