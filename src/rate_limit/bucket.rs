//! Per-route rate-limit state.

use crate::clock::Clock;
use crate::rate_limit::RateLimitHeaders;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Budget observed from the last response: both halves are learned together or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    remaining: u32,
    reset_millis: u64,
}

#[derive(Debug, Default)]
struct BucketState {
    window: Option<Window>,
    limit: Option<u32>,
}

/// Rate-limit state for one route key.
///
/// At most one request per bucket is in flight: callers hold a [`BucketPermit`] from
/// [`Bucket::acquire`] for the whole request/response exchange, and dropping the permit
/// releases the bucket.
#[derive(Debug)]
pub struct Bucket {
    key: String,
    gate: Arc<tokio::sync::Mutex<()>>,
    state: Mutex<BucketState>,
    clock: Arc<dyn Clock>,
}

/// Exclusive right to issue a request on a bucket. Released on drop.
#[derive(Debug)]
pub struct BucketPermit {
    _guard: OwnedMutexGuard<()>,
}

impl Bucket {
    pub(crate) fn new(key: String, clock: Arc<dyn Clock>) -> Self {
        Self {
            key,
            gate: Arc::new(tokio::sync::Mutex::new(())),
            state: Mutex::new(BucketState::default()),
            clock,
        }
    }

    /// Route key this bucket governs.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait (without timeout) until no other request holds this bucket.
    pub async fn acquire(&self) -> BucketPermit {
        BucketPermit { _guard: self.gate.clone().lock_owned().await }
    }

    /// Non-blocking variant of [`acquire`](Self::acquire).
    pub fn try_acquire(&self) -> Option<BucketPermit> {
        self.gate.clone().try_lock_owned().ok().map(|guard| BucketPermit { _guard: guard })
    }

    /// True iff the budget is known to be spent and the reset instant has not passed.
    ///
    /// Once the reset passes the bucket reads as free even if `remaining` is still recorded
    /// as zero; the next response corrects it.
    pub fn is_limited(&self) -> bool {
        let now = self.clock.now_millis();
        match self.lock().window {
            Some(Window { remaining: 0, reset_millis }) => now < reset_millis,
            _ => false,
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        self.lock().window.map(|w| w.remaining)
    }

    pub fn limit(&self) -> Option<u32> {
        self.lock().limit
    }

    /// Reset instant in epoch millis.
    pub fn reset(&self) -> Option<u64> {
        self.lock().window.map(|w| w.reset_millis)
    }

    /// Record an observed budget.
    pub fn set_window(&self, remaining: u32, reset_millis: u64) {
        self.lock().window = Some(Window { remaining, reset_millis });
    }

    /// Mark the bucket spent until `reset_millis`.
    pub fn exhaust_until(&self, reset_millis: u64) {
        self.set_window(0, reset_millis);
    }

    /// Forget the observed budget; the next response re-establishes it.
    pub fn clear(&self) {
        self.lock().window = None;
    }

    /// Overwrite whatever the response declared and leave everything else untouched.
    /// `remaining` and `reset` are only taken as a pair.
    pub fn update(&self, headers: &RateLimitHeaders) {
        let mut state = self.lock();
        if let (Some(remaining), Some(reset_millis)) = (headers.remaining, headers.reset_millis) {
            state.window = Some(Window { remaining, reset_millis });
        }
        if let Some(limit) = headers.limit {
            state.limit = Some(limit);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BucketState> {
        self.state.lock().expect("bucket state poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn bucket(clock: &ManualClock) -> Bucket {
        Bucket::new("/users".into(), Arc::new(clock.clone()))
    }

    #[test]
    fn fresh_bucket_is_not_limited() {
        let clock = ManualClock::new(1_000);
        let b = bucket(&clock);
        assert!(!b.is_limited());
        assert_eq!(b.remaining(), None);
        assert_eq!(b.reset(), None);
    }

    #[test]
    fn zero_remaining_limits_until_reset() {
        let clock = ManualClock::new(1_000);
        let b = bucket(&clock);
        b.set_window(0, 2_000);
        assert!(b.is_limited());

        clock.set(2_000);
        assert!(!b.is_limited(), "reset passed: caller should try again");
        assert_eq!(b.remaining(), Some(0));
    }

    #[test]
    fn remaining_budget_is_not_limited() {
        let clock = ManualClock::new(1_000);
        let b = bucket(&clock);
        b.set_window(3, 5_000);
        assert!(!b.is_limited());
    }

    #[test]
    fn update_applies_only_present_fields() {
        let clock = ManualClock::new(0);
        let b = bucket(&clock);
        b.update(&RateLimitHeaders {
            remaining: Some(4),
            limit: Some(5),
            reset_millis: Some(9_000),
            ..Default::default()
        });
        assert_eq!((b.remaining(), b.limit(), b.reset()), (Some(4), Some(5), Some(9_000)));

        b.update(&RateLimitHeaders::default());
        assert_eq!((b.remaining(), b.limit(), b.reset()), (Some(4), Some(5), Some(9_000)));

        // a lone remaining without reset would break the pairing; ignored
        b.update(&RateLimitHeaders { remaining: Some(1), ..Default::default() });
        assert_eq!(b.remaining(), Some(4));
    }

    #[tokio::test]
    async fn permit_is_exclusive_until_dropped() {
        let clock = ManualClock::new(0);
        let b = bucket(&clock);
        let permit = b.acquire().await;
        assert!(b.try_acquire().is_none());
        drop(permit);
        assert!(b.try_acquire().is_some());
    }
}
