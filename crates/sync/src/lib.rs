//! Velvet Bean Sync - cart/wishlist synchronization core.
//!
//! This crate keeps a signed-in user's cart quantities and wishlist
//! membership consistent with a remote, eventually-visible document store,
//! across multiple UI entry points that can race each other, without
//! server-side transactions.
//!
//! # Architecture
//!
//! - The store is source of truth - every mutation is a query-then-write
//!   sequence against the [`store::CollectionStore`] capability, never a
//!   local cache update
//! - Reads are best-effort: the [`projector`] consumes a full-replace change
//!   feed and rebuilds the cart view wholesale on every event
//! - Identity is explicit: a [`identity::SessionIdentity`] is constructed
//!   and passed into the reconciler and projector, never read from an
//!   ambient singleton
//!
//! # Modules
//!
//! - [`store`] - Document store capability trait and in-memory implementation
//! - [`identity`] - Signed-in user capability
//! - [`line_item`] - Cart and wishlist documents
//! - [`quantity`] - Cart line transition planning
//! - [`reconciler`] - Uniqueness-preserving upsert/delete engine
//! - [`projector`] - Live change feed into an ordered cart view
//! - [`notify`] - Single-slot auto-expiring status message
//! - [`config`] - Collection names and timing knobs
//!
//! # Example
//!
//! ```rust,ignore
//! use velvet_bean_sync::{
//!     config::SyncConfig,
//!     identity::SessionIdentity,
//!     notify::Notifier,
//!     projector::CartProjector,
//!     reconciler::Reconciler,
//!     store::MemoryStore,
//! };
//!
//! let config = SyncConfig::default();
//! let store = MemoryStore::new();
//! let identity = SessionIdentity::signed_in(user);
//! let notifier = Notifier::new(config.notice_ttl);
//!
//! let cart = CartProjector::spawn(store.clone(), &identity, config.clone());
//! let reconciler = Reconciler::new(store, identity, notifier, config);
//!
//! reconciler.add_to_cart(&product).await?;
//! assert_eq!(cart.view().item_count, 1);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod identity;
pub mod line_item;
pub mod notify;
pub mod projector;
pub mod quantity;
pub mod reconciler;
pub mod store;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use identity::{CurrentUser, IdentityProvider, SessionIdentity};
pub use line_item::{CartLine, CartLineRecord, ProductSummary, WishlistEntry};
pub use notify::{Notice, NoticeKind, Notifier};
pub use projector::{CartProjector, CartView, CartViewHandle};
pub use quantity::{LineState, WritePlan};
pub use reconciler::{MutationGate, Reconciler};
pub use store::{CollectionStore, Document, Filter, MemoryStore, StoreError, Subscription};
