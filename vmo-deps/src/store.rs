//! Dependency list operations.
//!
//! All mutating operations consume the list and return the new one, so a
//! caller holding an earlier snapshot never observes a later change.

use crate::types::{DependencyList, DependencyRecord};

impl DependencyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DependencyRecord> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[DependencyRecord] {
        &self.0
    }

    /// First record tracking `pool_name`.
    pub fn find_by_pool(&self, pool_name: &str) -> Option<&DependencyRecord> {
        self.0.iter().find(|d| d.pool_name == pool_name)
    }

    /// Whether any record references the remote resource `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.0.iter().any(|d| d.id == id)
    }

    /// Independent deep copy of the list.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Replace the record tracking the same pool, or append if there is none.
    pub fn upsert_by_pool(mut self, record: DependencyRecord) -> Self {
        match self.0.iter().position(|d| d.pool_name == record.pool_name) {
            Some(idx) => self.0[idx] = record,
            None => self.0.push(record),
        }
        self
    }

    /// Remove the first record equal to `record` in every field. A record
    /// that matches only by pool name is left in place.
    pub fn remove_exact(mut self, record: &DependencyRecord) -> Self {
        if let Some(idx) = self.0.iter().position(|d| d == record) {
            self.0.remove(idx);
        }
        self
    }
}

impl From<Vec<DependencyRecord>> for DependencyList {
    fn from(records: Vec<DependencyRecord>) -> Self {
        Self(records)
    }
}

impl FromIterator<DependencyRecord> for DependencyList {
    fn from_iter<I: IntoIterator<Item = DependencyRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for DependencyList {
    type Item = DependencyRecord;
    type IntoIter = std::vec::IntoIter<DependencyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DependencyList {
    type Item = &'a DependencyRecord;
    type IntoIter = std::slice::Iter<'a, DependencyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
