//! Registry of route buckets.

use crate::clock::{Clock, SystemClock};
use crate::rate_limit::{parse_endpoint, Bucket};
use crate::sleeper::{Sleeper, TokioSleeper};
use http::Method;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::debug;

/// Owns one [`Bucket`] per route key and knows how to wait out exhausted windows.
///
/// Buckets live as long as the limiter. Clones share the same buckets.
#[derive(Clone, Debug)]
pub struct Limiter {
    buckets: Arc<RwLock<HashMap<String, Arc<Bucket>>>>,
    global_reset: Arc<Mutex<Option<u64>>>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(TokioSleeper))
    }
}

impl Limiter {
    pub fn new(clock: Arc<dyn Clock>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            global_reset: Arc::new(Mutex::new(None)),
            clock,
            sleeper,
        }
    }

    /// Bucket for a request, created on first use. Concurrent first access for the same
    /// route yields the same bucket.
    pub fn bucket(&self, method: &Method, path: &str) -> Arc<Bucket> {
        let key = parse_endpoint(path, method);
        {
            let map = self.buckets.read().expect("limiter bucket map poisoned");
            if let Some(bucket) = map.get(&key) {
                return bucket.clone();
            }
        }
        let mut map = self.buckets.write().expect("limiter bucket map poisoned");
        map.entry(key)
            .or_insert_with_key(|key| {
                debug!(target: "gatewire::limiter", route = %key, "bucket created");
                Arc::new(Bucket::new(key.clone(), self.clock.clone()))
            })
            .clone()
    }

    /// Block until `bucket`'s reset instant has passed, then forget its window so the next
    /// response re-establishes it. There is no timeout: the remote service decides how long.
    pub async fn wait(&self, bucket: &Bucket) {
        if let Some(reset) = bucket.reset() {
            let now = self.clock.now_millis();
            if reset > now {
                let delay = Duration::from_millis(reset - now);
                debug!(target: "gatewire::limiter", route = %bucket.key(), ?delay, "waiting for bucket reset");
                self.sleeper.sleep(delay).await;
            }
        }
        bucket.clear();
    }

    /// Record an application-wide limit lasting until `reset_millis`.
    pub fn set_global_reset(&self, reset_millis: u64) {
        let mut guard = self.global_reset.lock().expect("global reset poisoned");
        *guard = Some(guard.map_or(reset_millis, |current| current.max(reset_millis)));
    }

    /// Pending application-wide reset, if any.
    pub fn global_reset(&self) -> Option<u64> {
        *self.global_reset.lock().expect("global reset poisoned")
    }

    /// Wait out an application-wide limit if one is pending.
    pub async fn wait_global(&self) {
        let Some(reset) = self.global_reset() else { return };
        let now = self.clock.now_millis();
        if reset > now {
            let delay = Duration::from_millis(reset - now);
            debug!(target: "gatewire::limiter", ?delay, "waiting for global rate limit");
            self.sleeper.sleep(delay).await;
        }
        let mut guard = self.global_reset.lock().expect("global reset poisoned");
        if guard.is_some_and(|r| r <= self.clock.now_millis()) {
            *guard = None;
        }
    }

    /// Current time according to the limiter's clock.
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Number of distinct buckets created so far.
    pub fn len(&self) -> usize {
        self.buckets.read().expect("limiter bucket map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route keys with a bucket, sorted.
    pub fn keys(&self) -> Vec<String> {
        let map = self.buckets.read().expect("limiter bucket map poisoned");
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }
}
