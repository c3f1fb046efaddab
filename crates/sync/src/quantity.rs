//! Cart line transition planning.
//!
//! The reconciler observes a line's stored state, and this module decides
//! the single write that moves it to the next state:
//!
//! - `Absent --add(n)--> Present(max(1, n))` (insert)
//! - `Present(q) --add(n)--> Present(q+n)` (update)
//! - `Present(q) --remove(n)--> Present(q-n)` if `q-n >= 1` (update),
//!   else `Absent` (delete)
//! - `Absent --remove(n)--> Absent` (no write issued)
//!
//! Centralizing the table here keeps the reconciler's write paths to a
//! single match and makes the transitions unit-testable without a store.

use crate::error::{Result, SyncError};

/// Stored state of one (user, product) cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// No record exists for the pair.
    Absent,
    /// One record exists with this quantity (always >= 1 in storage).
    Present(u32),
}

/// The single write that realizes a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePlan {
    /// Insert a new record at this quantity.
    Insert(u32),
    /// Update the existing record's quantity field to this value.
    Update(u32),
    /// Delete the existing record.
    Delete,
    /// Issue no write at all.
    Noop,
}

/// Plan the write for applying `delta` to a line in `state`.
///
/// # Errors
///
/// Returns [`SyncError::InvariantViolation`] if the observed state is
/// unrepresentable (a stored quantity of zero, or a result that overflows);
/// the caller aborts without writing.
pub fn plan(state: LineState, delta: i64) -> Result<WritePlan> {
    match state {
        LineState::Absent => {
            if delta <= 0 {
                // Removing what is not there is a no-op, not an error.
                return Ok(WritePlan::Noop);
            }
            let quantity = u32::try_from(delta).map_err(|_| overflow(delta))?;
            Ok(WritePlan::Insert(quantity.max(1)))
        }
        LineState::Present(0) => Err(SyncError::InvariantViolation(
            "stored cart line has quantity 0; it should have been deleted".to_string(),
        )),
        LineState::Present(quantity) => {
            if delta == 0 {
                return Ok(WritePlan::Noop);
            }
            let next = i64::from(quantity) + delta;
            if next <= 0 {
                Ok(WritePlan::Delete)
            } else {
                let next = u32::try_from(next).map_err(|_| overflow(next))?;
                Ok(WritePlan::Update(next))
            }
        }
    }
}

fn overflow(value: i64) -> SyncError {
    SyncError::InvariantViolation(format!("quantity {value} is out of range"))
}
