//! Name-ordered registry with stable ids
//!
//! Entries are stored in insertion order so their index never changes, while
//! a separate order vector keeps ids sorted by name for ascending iteration
//! and binary-search lookup.

/// Something identified by a unique name
pub trait Named {
    fn name(&self) -> &str;
}

/// Insert-if-absent collection kept in ascending name order
#[derive(Debug, Clone)]
pub struct SortedRegistry<T> {
    entries: Vec<T>,
    order: Vec<usize>,
}

impl<T: Named> SortedRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id of the entry called `name`
    pub fn find(&self, name: &str) -> Option<usize> {
        self.position(name).ok().map(|pos| self.order[pos])
    }

    /// Insert the entry built by `make` unless `name` is already present.
    /// Returns the entry's id and whether it was created.
    pub fn insert_if_absent(&mut self, name: &str, make: impl FnOnce() -> T) -> (usize, bool) {
        match self.position(name) {
            Ok(pos) => (self.order[pos], false),
            Err(pos) => {
                let id = self.entries.len();
                self.entries.push(make());
                self.order.insert(pos, id);
                (id, true)
            }
        }
    }

    /// Id and entry called `name`, created by `make` when absent
    pub fn entry(&mut self, name: &str, make: impl FnOnce() -> T) -> (usize, &mut T) {
        let (id, _) = self.insert_if_absent(name, make);
        (id, &mut self.entries[id])
    }

    pub fn get(&self, id: usize) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.entries.get_mut(id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.find(name).and_then(|id| self.get(id))
    }

    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut T> {
        let id = self.find(name)?;
        self.get_mut(id)
    }

    /// `(id, entry)` pairs in ascending name order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.order.iter().map(move |&id| (id, &self.entries[id]))
    }

    /// Names in ascending order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(_, entry)| entry.name())
    }

    fn position(&self, name: &str) -> Result<usize, usize> {
        self.order
            .binary_search_by(|&id| self.entries[id].name().cmp(name))
    }
}

impl<T: Named> Default for SortedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
