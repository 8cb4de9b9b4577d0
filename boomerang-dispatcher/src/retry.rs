//! Pure retry/terminal decision for a dispatched item.
//!
//! An item is terminal if it has no attempts left, if its TTL has already
//! passed, or if the *next* scheduled firing would itself exceed the TTL.
//! The back-off is fixed and additive: `sendAfter` moves forward by exactly
//! `backOffMs` each time, never growing.

use boomerang_storage::ScheduledItem;

/// Retry/terminal decision, parametric only on the wall clock — everything
/// else needed is already on the item.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy;

impl RetryPolicy {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// `true` if `item` should be rescheduled rather than dropped, given
    /// the current time `now` (ms since epoch).
    #[must_use]
    pub fn is_retryable(&self, item: &ScheduledItem, now: u64) -> bool {
        if item.max_retry <= 1 {
            return false;
        }
        if now >= item.time_to_live {
            return false;
        }
        if item.send_after.saturating_add(item.back_off_ms) > item.time_to_live {
            return false;
        }
        true
    }

    /// Applies a retry to `item` in place: `sendAfter += backOffMs`,
    /// `maxRetry -= 1`. Caller is responsible for persisting the result.
    pub fn apply(&self, item: &mut ScheduledItem) {
        item.send_after = item.send_after.saturating_add(item.back_off_ms);
        item.max_retry -= 1;
    }
}
