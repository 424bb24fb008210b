//! Randomized-level ordered index
//!
//! A skip list whose nodes live in a single arena and link to each other by
//! index. Each node gets a height drawn from repeated fair coin flips, capped
//! at the configured maximum level.
//!
//! ```text
//! level 2: head ---------------> 8 ---------------------> nil
//! level 1: head ------> 3 -----> 8 -----------> 25 -----> nil
//! level 0: head -> 1 -> 3 -> 5 -> 8 -> 13 -> 19 -> 25 --> nil
//! ```
//!
//! Removal keeps the arena dense by moving the last node into the freed slot
//! and re-pointing its predecessors, so indices never dangle.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::borrow::Borrow;
use std::cmp::Ordering;

/// Default cap on node height
pub const DEFAULT_MAX_LEVEL: usize = 12;

/// Probability that a node is promoted one more level
const PROMOTION_PROBABILITY: f64 = 0.5;

#[derive(Debug, Clone)]
struct Node<K> {
    key: K,
    next: Vec<Option<usize>>,
}

/// Ordered set with expected logarithmic search, insert and remove
#[derive(Debug, Clone)]
pub struct OrderedIndex<K> {
    nodes: Vec<Node<K>>,
    head: Vec<Option<usize>>,
    level: usize,
    max_level: usize,
    rng: ChaCha8Rng,
}

impl<K: Ord> OrderedIndex<K> {
    /// Create an empty index with the default maximum level
    pub fn new() -> Self {
        Self::with_max_level(DEFAULT_MAX_LEVEL)
    }

    /// Create an empty index whose nodes are at most `max_level` high
    pub fn with_max_level(max_level: usize) -> Self {
        Self::build(max_level, ChaCha8Rng::from_entropy())
    }

    /// Create an index with a reproducible level sequence
    pub fn with_seed(max_level: usize, seed: u64) -> Self {
        Self::build(max_level, ChaCha8Rng::seed_from_u64(seed))
    }

    fn build(max_level: usize, rng: ChaCha8Rng) -> Self {
        let max_level = max_level.max(1);
        Self {
            nodes: Vec::new(),
            head: vec![None; max_level],
            level: 0,
            max_level,
            rng,
        }
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Height of the tallest node currently linked
    pub fn height(&self) -> usize {
        self.level
    }

    /// Insert `key`. Returns false and leaves the index untouched on a duplicate.
    pub fn insert(&mut self, key: K) -> bool {
        let path = self.find_path(&key);
        if let Some(found) = self.next_of(path[0], 0) {
            if self.nodes[found].key == key {
                return false;
            }
        }

        let height = self.random_level();
        if height > self.level {
            self.level = height;
        }

        let idx = self.nodes.len();
        let next = (0..height).map(|lvl| self.next_of(path[lvl], lvl)).collect();
        for (lvl, pred) in path.iter().enumerate().take(height) {
            self.set_next(*pred, lvl, Some(idx));
        }
        self.nodes.push(Node { key, next });
        true
    }

    /// Look up the stored key equal to `key`
    pub fn search<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let path = self.find_path(key);
        self.next_of(path[0], 0)
            .map(|idx| &self.nodes[idx].key)
            .filter(|found| Borrow::<Q>::borrow(*found) == key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.search(key).is_some()
    }

    /// Remove and return the stored key equal to `key`
    pub fn remove<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let path = self.find_path(key);
        let target = self.next_of(path[0], 0)?;
        if Borrow::<Q>::borrow(&self.nodes[target].key) != key {
            return None;
        }

        self.unlink(target, &path);
        while self.level > 0 && self.head[self.level - 1].is_none() {
            self.level -= 1;
        }

        let last = self.nodes.len() - 1;
        if target != last {
            let moved_path = self.find_path::<K>(&self.nodes[last].key);
            for lvl in 0..self.nodes[last].next.len() {
                if self.next_of(moved_path[lvl], lvl) == Some(last) {
                    self.set_next(moved_path[lvl], lvl, Some(target));
                }
            }
        }
        Some(self.nodes.swap_remove(target).key)
    }

    /// Keys in ascending order
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            index: self,
            cursor: self.head[0],
        }
    }

    fn unlink(&mut self, target: usize, path: &[Option<usize>]) {
        for lvl in 0..self.nodes[target].next.len() {
            if self.next_of(path[lvl], lvl) == Some(target) {
                let after = self.nodes[target].next[lvl];
                self.set_next(path[lvl], lvl, after);
            }
        }
    }

    /// For every level, the last node whose key is strictly below `key`
    /// (`None` stands for the head).
    fn find_path<Q>(&self, key: &Q) -> Vec<Option<usize>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut path = vec![None; self.max_level];
        let mut cur: Option<usize> = None;
        for lvl in (0..self.level).rev() {
            while let Some(next) = self.next_of(cur, lvl) {
                match Borrow::<Q>::borrow(&self.nodes[next].key).cmp(key) {
                    Ordering::Less => cur = Some(next),
                    _ => break,
                }
            }
            path[lvl] = cur;
        }
        path
    }

    fn next_of(&self, node: Option<usize>, lvl: usize) -> Option<usize> {
        match node {
            None => self.head[lvl],
            Some(idx) => self.nodes[idx].next[lvl],
        }
    }

    fn set_next(&mut self, node: Option<usize>, lvl: usize, target: Option<usize>) {
        match node {
            None => self.head[lvl] = target,
            Some(idx) => self.nodes[idx].next[lvl] = target,
        }
    }

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < self.max_level && self.rng.gen_bool(PROMOTION_PROBABILITY) {
            level += 1;
        }
        level
    }
}

impl<K: Ord> Default for OrderedIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Ascending iterator over an [`OrderedIndex`]
pub struct Iter<'a, K> {
    index: &'a OrderedIndex<K>,
    cursor: Option<usize>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let node = &self.index.nodes[self.cursor?];
        self.cursor = node.next[0];
        Some(&node.key)
    }
}

impl<'a, K: Ord> IntoIterator for &'a OrderedIndex<K> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
