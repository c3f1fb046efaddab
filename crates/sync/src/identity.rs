//! Signed-in user capability.
//!
//! Identity is explicit context: a [`SessionIdentity`] is constructed at
//! composition time and passed into the reconciler and projector. Nothing
//! in this crate reads sign-in state from an ambient singleton, which is
//! what lets tests inject fixed identities.

use std::sync::Arc;

use tokio::sync::watch;
use velvet_bean_core::{Email, UserId};

/// The signed-in user, as reported by the external auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    /// Auth-provider-assigned user id.
    pub id: UserId,
    /// Verified email address.
    pub email: Email,
}

/// Read access to sign-in state, plus a change notification that flips on
/// sign-in/sign-out.
pub trait IdentityProvider: Send + Sync {
    /// The currently signed-in user, if any.
    fn current_user(&self) -> Option<CurrentUser>;

    /// A receiver that observes every sign-in state change.
    fn watch_user(&self) -> watch::Receiver<Option<CurrentUser>>;
}

/// Session-scoped identity backed by a watch channel.
///
/// The auth integration calls [`sign_in`](Self::sign_in) /
/// [`sign_out`](Self::sign_out) as the external provider reports changes;
/// consumers observe through [`IdentityProvider`].
#[derive(Clone)]
pub struct SessionIdentity {
    tx: Arc<watch::Sender<Option<CurrentUser>>>,
}

impl SessionIdentity {
    /// Create a signed-out identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::channel(None).0),
        }
    }

    /// Create an identity already signed in as `user`.
    #[must_use]
    pub fn signed_in(user: CurrentUser) -> Self {
        Self {
            tx: Arc::new(watch::channel(Some(user)).0),
        }
    }

    /// Report a sign-in from the auth provider.
    pub fn sign_in(&self, user: CurrentUser) {
        self.tx.send_replace(Some(user));
    }

    /// Report a sign-out from the auth provider.
    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<CurrentUser> {
        self.tx.borrow().clone()
    }

    fn watch_user(&self) -> watch::Receiver<Option<CurrentUser>> {
        self.tx.subscribe()
    }
}
