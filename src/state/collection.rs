use crate::clock::{duration_millis, Clock};
use crate::config::{CacheTtls, DynamicConfig};
use crate::entities::{Entity, Merge};
use crate::state::EntityKind;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use tracing::trace;

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    expires_at: Option<u64>,
}

impl<V> Slot<V> {
    fn is_live(&self, now: u64) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Keyed entity store with merge-on-upsert and lazily purged TTLs.
///
/// Every upsert runs its read-merge-write under the write lock, so concurrent upserts to
/// the same key serialize and no merge observes a torn value. Clones share storage.
pub struct Collection<K, V> {
    kind: EntityKind,
    entries: Arc<RwLock<HashMap<K, Slot<V>>>>,
    ttls: DynamicConfig<CacheTtls>,
    clock: Arc<dyn Clock>,
}

impl<K, V> Clone for Collection<K, V> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            entries: self.entries.clone(),
            ttls: self.ttls.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<K, V> fmt::Debug for Collection<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.entries.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("Collection").field("kind", &self.kind).field("entries", &len).finish()
    }
}

impl<K, V> Collection<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Merge + Clone + Send + Sync + 'static,
{
    pub fn new(kind: EntityKind, ttls: DynamicConfig<CacheTtls>, clock: Arc<dyn Clock>) -> Self {
        Self { kind, entries: Arc::new(RwLock::new(HashMap::new())), ttls, clock }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    fn expiry_from(&self, now: u64) -> Option<u64> {
        self.ttls.get().for_kind(self.kind).map(|ttl| now.saturating_add(duration_millis(ttl)))
    }

    /// Insert `value` if `key` is absent (or expired), otherwise store and return
    /// `merge(existing, value)`. Either way the entry's TTL restarts.
    pub fn upsert(&self, key: K, value: V) -> V {
        let now = self.clock.now_millis();
        let expires_at = self.expiry_from(now);
        let mut map = self.entries.write().expect("collection poisoned");
        let stored = match map.remove(&key) {
            Some(slot) if slot.is_live(now) => slot.value.merge(value),
            _ => value,
        };
        trace!(target: "gatewire::state", kind = %self.kind, key = ?key, "upsert");
        map.insert(key, Slot { value: stored.clone(), expires_at });
        stored
    }

    /// Read-modify-write of a live entry; `None` when absent. The TTL is left as is.
    pub fn modify<F>(&self, key: &K, f: F) -> Option<V>
    where
        F: FnOnce(&mut V),
    {
        let now = self.clock.now_millis();
        let mut map = self.entries.write().expect("collection poisoned");
        if !map.get(key)?.is_live(now) {
            map.remove(key);
            return None;
        }
        let slot = map.get_mut(key)?;
        f(&mut slot.value);
        Some(slot.value.clone())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now_millis();
        {
            let map = self.entries.read().expect("collection poisoned");
            match map.get(key) {
                Some(slot) if slot.is_live(now) => return Some(slot.value.clone()),
                None => return None,
                Some(_) => {}
            }
        }
        let mut map = self.entries.write().expect("collection poisoned");
        // Re-check under the write lock; an upsert may have refreshed it meanwhile.
        if map.get(key).is_some_and(|slot| !slot.is_live(now)) {
            map.remove(key);
            trace!(target: "gatewire::state", kind = %self.kind, key = ?key, "expired entry purged");
        }
        map.get(key).map(|slot| slot.value.clone())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let now = self.clock.now_millis();
        let mut map = self.entries.write().expect("collection poisoned");
        map.remove(key).filter(|slot| slot.is_live(now)).map(|slot| slot.value)
    }

    /// Remove every entry matching `predicate`, returning how many were removed.
    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut map = self.entries.write().expect("collection poisoned");
        let before = map.len();
        map.retain(|k, slot| !predicate(k, &slot.value));
        before - map.len()
    }

    /// Live entries only.
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        let map = self.entries.read().expect("collection poisoned");
        map.values().filter(|slot| slot.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of live values, in no particular order.
    pub fn values(&self) -> Vec<V> {
        let now = self.clock.now_millis();
        let map = self.entries.read().expect("collection poisoned");
        map.values().filter(|slot| slot.is_live(now)).map(|slot| slot.value.clone()).collect()
    }

    /// Drop expired entries now rather than on next access.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut map = self.entries.write().expect("collection poisoned");
        let before = map.len();
        map.retain(|_, slot| slot.is_live(now));
        before - map.len()
    }

    pub fn clear(&self) {
        self.entries.write().expect("collection poisoned").clear();
    }
}

impl<V> Collection<V::Key, V>
where
    V: Entity,
{
    /// Upsert keyed by the value's own identity. `None` if the value carries none.
    pub fn upsert_entity(&self, value: V) -> Option<V> {
        let key = value.key()?;
        Some(self.upsert(key, value))
    }
}
