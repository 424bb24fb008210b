//! Fixed-bucket chained hash table
//!
//! Buckets are chosen with `hash(key) % bucket_count` and never resized.
//! Operations scan only the selected bucket.

use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Buckets used for the per-worker citizen registry
pub const CITIZEN_BUCKETS: usize = 1000;

/// Buckets used for the per-(virus, country) statistics table
pub const STAT_BUCKETS: usize = 100;

/// Hash table with a fixed number of separately chained buckets
#[derive(Debug, Clone)]
pub struct ChainedTable<K, V> {
    buckets: Vec<Vec<(K, V)>>,
    len: usize,
}

impl<K: Hash + Eq, V> ChainedTable<K, V> {
    /// Create a table with `bucket_count` buckets (at least one)
    pub fn new(bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(1);
        Self {
            buckets: (0..bucket_count).map(|_| Vec::new()).collect(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Insert or replace. Returns the previous value for `key`.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let bucket = self.bucket_of(&key);
        let chain = &mut self.buckets[bucket];
        if let Some(slot) = chain.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        chain.push((key, value));
        self.len += 1;
        None
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let bucket = self.bucket_of(key);
        self.buckets[bucket]
            .iter()
            .find(|(k, _)| Borrow::<Q>::borrow(k) == key)
            .map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let bucket = self.bucket_of(key);
        self.buckets[bucket]
            .iter_mut()
            .find(|(k, _)| Borrow::<Q>::borrow(k) == key)
            .map(|(_, v)| v)
    }

    /// Value for `key`, inserting `make()` first when absent
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        let bucket = self.bucket_of(&key);
        let chain = &mut self.buckets[bucket];
        let pos = match chain.iter().position(|(k, _)| *k == key) {
            Some(pos) => pos,
            None => {
                chain.push((key, make()));
                self.len += 1;
                chain.len() - 1
            }
        };
        &mut chain[pos].1
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let bucket = self.bucket_of(key);
        let chain = &mut self.buckets[bucket];
        let pos = chain.iter().position(|(k, _)| Borrow::<Q>::borrow(k) == key)?;
        self.len -= 1;
        Some(chain.swap_remove(pos).1)
    }

    /// All entries, bucket by bucket
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.buckets
            .iter()
            .flat_map(|chain| chain.iter().map(|(k, v)| (k, v)))
    }

    fn bucket_of<Q: Hash + ?Sized>(&self, key: &Q) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.buckets.len() as u64) as usize
    }
}
