//! Unified error handling for the synchronization core.
//!
//! Every mutation entry point returns `Result<T, SyncError>`. Failures are
//! caught at the reconciler boundary and converted to a notification; none
//! propagate silently.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by cart and wishlist operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No signed-in identity at mutation time. User-visible prompt, no retry.
    #[error("Authentication required")]
    AuthRequired,

    /// Transient network/service failure reaching the store. Not retried
    /// automatically; the user re-triggers the action.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store rejected the write (remote constraint violation).
    #[error("Store write rejected: {0}")]
    StoreWriteRejected(String),

    /// A condition that should have been handled upstream reached a write
    /// path. Aborts the operation with no partial write.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::Rejected(msg) => Self::StoreWriteRejected(msg),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        // A stored document that no longer matches the expected shape is a
        // remote-data problem, not a local bug.
        Self::StoreWriteRejected(format!("document shape mismatch: {err}"))
    }
}

/// Result type alias for `SyncError`.
pub type Result<T> = std::result::Result<T, SyncError>;
