//! Sections and ordered per-section device collections.

use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Classification of a device series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Section {
    /// Main scan body, indexed by position count.
    Standard,
    /// State dump, indexed by position count.
    Snapshot,
    /// Asynchronous readings, indexed by milliseconds since start.
    Monitor,
    /// The position to time lookup table.
    Timestamp,
}

impl Section {
    /// Returns true if the index holds position counts.
    #[must_use]
    pub fn is_position_indexed(self) -> bool {
        !matches!(self, Self::Monitor)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standard => "standard",
            Self::Snapshot => "snapshot",
            Self::Monitor => "monitor",
            Self::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Map from device identifier to entry, iterating in insertion order.
#[derive(Debug, Clone)]
pub struct SectionMap<T> {
    entries: Vec<(String, T)>,
    lookup: HashMap<String, usize>,
}

impl<T> Default for SectionMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            lookup: HashMap::new(),
        }
    }
}

impl<T> SectionMap<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry; an existing entry keeps its place and is replaced.
    ///
    /// Returns the replaced entry.
    pub fn insert(&mut self, id: impl Into<String>, value: T) -> Option<T> {
        let id = id.into();
        if let Some(&idx) = self.lookup.get(&id) {
            return Some(std::mem::replace(&mut self.entries[idx].1, value));
        }
        self.lookup.insert(id.clone(), self.entries.len());
        self.entries.push((id, value));
        None
    }

    /// Removes an entry, keeping the order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let idx = self.lookup.remove(id)?;
        let (_, value) = self.entries.remove(idx);
        for slot in self.lookup.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Some(value)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.lookup.get(id).map(|&idx| &self.entries[idx].1)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.lookup.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifiers in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(id, v)| (id.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for SectionMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (id, value) in iter {
            map.insert(id, value);
        }
        map
    }
}

impl<T> IntoIterator for SectionMap<T> {
    type Item = (String, T);
    type IntoIter = std::vec::IntoIter<(String, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_kept() {
        let map: SectionMap<i32> = [("b", 1), ("a", 2), ("c", 3)].into_iter().collect();
        assert_eq!(map.ids().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(map.get("a"), Some(&2));
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut map: SectionMap<i32> = [("b", 1), ("a", 2)].into_iter().collect();
        assert_eq!(map.insert("b", 5), Some(1));
        assert_eq!(map.ids().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&5));
    }

    #[test]
    fn test_remove_reindexes() {
        let mut map: SectionMap<i32> = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        assert_eq!(map.remove("a"), Some(1));
        assert_eq!(map.get("c"), Some(&3));
        assert_eq!(map.ids().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(map.remove("a"), None);
    }

    #[test]
    fn test_monitor_section_is_time_indexed() {
        assert!(!Section::Monitor.is_position_indexed());
        assert!(Section::Snapshot.is_position_indexed());
        assert_eq!(Section::Timestamp.to_string(), "timestamp");
    }
}
