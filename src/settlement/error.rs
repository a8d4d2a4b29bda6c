//! Error taxonomy of the settlement core.
//!
//! Only the settlement service decides atomicity outcomes; the aggregators
//! are pure and cannot fail. Malformed numeric input is rejected as
//! `Validation` before any mutation is attempted.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HiveError {
    /// Missing or malformed required field, non-positive amount_in.
    /// Terminal — never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// agent_key does not reference a registered agent. Terminal.
    #[error("not found: {0}")]
    NotFound(String),

    /// The ledger + agent + knowledge commit could not be completed
    /// (key lock conflict). Nothing partial was committed — the whole
    /// submission is safe to retry with backoff.
    #[error("atomic commit failed: {0}")]
    Atomicity(String),

    /// Any other unexpected fault. Logged; generic message surfaced.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HiveError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, HiveError::Atomicity(_))
    }
}
