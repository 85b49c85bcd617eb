use std::collections::HashMap;

/// Id-allocating storage for graphs or contexts.
///
/// Ids are never reused within one registry, so a stale id held by a host
/// after deletion can never alias a newer entry.
#[derive(Debug)]
pub struct Registry<T> {
    entries: HashMap<u32, T>,
    next_id: u32,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under a fresh id.
    pub fn insert(&mut self, value: T) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.insert(id, value);
        id
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.entries.get_mut(&id)
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
