use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Storage for values a `Loader` has already resolved.
///
/// The loader holds its cache behind its own lock, so implementations need no interior
/// synchronization. Entries never expire; they leave the cache only through [`Cache::remove`]
/// or [`Cache::flush`].
pub trait Cache {
    type K;
    type V;

    fn get(&self, key: &Self::K) -> Option<&Self::V>;

    fn insert(&mut self, key: Self::K, value: Self::V);

    /// Inserts `value` only if `key` has no entry yet. Returns whether the write happened.
    fn insert_if_absent(&mut self, key: Self::K, value: Self::V) -> bool;

    fn remove(&mut self, key: &Self::K);
    fn flush(&mut self);
}

impl<K, V, S: BuildHasher> Cache for HashMap<K, V, S>
where
    K: Eq + Hash,
{
    type K = K;
    type V = V;

    fn get(&self, key: &Self::K) -> Option<&Self::V> {
        HashMap::get(self, key)
    }

    fn insert(&mut self, key: Self::K, value: Self::V) {
        HashMap::insert(self, key, value);
    }

    fn insert_if_absent(&mut self, key: Self::K, value: Self::V) -> bool {
        match self.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    fn remove(&mut self, key: &Self::K) {
        HashMap::remove(self, key);
    }

    fn flush(&mut self) {
        self.clear();
    }
}
