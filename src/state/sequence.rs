//! The sequence form of upsert, for entity lists embedded in other entities
//! (a guild's channels, roles, members).

use crate::entities::{Entity, Merge};

/// Merge `value` into the first element whose `key_fn` equals `key`, or append it.
/// Returns the stored value.
pub fn upsert_seq<T, K, F>(seq: &mut Vec<T>, key: &K, value: T, key_fn: F) -> T
where
    T: Merge + Clone,
    K: PartialEq,
    F: Fn(&T) -> Option<K>,
{
    match seq.iter().position(|e| key_fn(e).as_ref() == Some(key)) {
        Some(idx) => {
            let existing = seq.remove(idx);
            let merged = existing.merge(value);
            seq.insert(idx, merged.clone());
            merged
        }
        None => {
            seq.push(value.clone());
            value
        }
    }
}

/// [`upsert_seq`] keyed by the value's own identity. A value without one is appended.
pub fn upsert_seq_entity<T: Entity>(seq: &mut Vec<T>, value: T) -> T {
    match value.key() {
        Some(key) => upsert_seq(seq, &key, value, |e: &T| e.key()),
        None => {
            seq.push(value.clone());
            value
        }
    }
}

/// Remove every element whose identity is `key`.
pub fn remove_seq<T: Entity>(seq: &mut Vec<T>, key: &T::Key) -> usize {
    let before = seq.len();
    seq.retain(|e| e.key().as_ref() != Some(key));
    before - seq.len()
}
