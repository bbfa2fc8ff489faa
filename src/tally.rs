//! Insertion-ordered counters behind every breakdown in both reports.

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NameValue {
    pub name: String,
    pub value: u64,
}

/// Counts keyed by label, remembering the order each label was first seen.
/// Serializes as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str) {
        self.add_n(key, 1);
    }

    pub fn add_n(&mut self, key: &str, amount: u64) {
        match self.index.get(key) {
            Some(&slot) => self.entries[slot].1 += amount,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), amount));
            }
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.index
            .get(key)
            .map(|&slot| self.entries[slot].1)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(key, count)| (key.as_str(), *count))
    }

    /// Descending by count; ties keep first-seen order.
    pub fn ranked(&self) -> Vec<NameValue> {
        let mut ranked: Vec<NameValue> = self
            .entries
            .iter()
            .map(|(name, value)| NameValue {
                name: name.clone(),
                value: *value,
            })
            .collect();
        ranked.sort_by(|a, b| b.value.cmp(&a.value));
        ranked
    }

    pub fn top(&self, limit: usize) -> Vec<NameValue> {
        let mut ranked = self.ranked();
        ranked.truncate(limit);
        ranked
    }
}

impl<'a> FromIterator<&'a str> for Tally {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for key in iter {
            tally.add(key);
        }
        tally
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, count) in &self.entries {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

/// Two-level tally, e.g. category -> reason -> count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedTally {
    rows: Vec<(String, Tally)>,
    index: HashMap<String, usize>,
}

impl NestedTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, outer: &str, inner: &str) {
        let slot = match self.index.get(outer) {
            Some(&slot) => slot,
            None => {
                self.index.insert(outer.to_string(), self.rows.len());
                self.rows.push((outer.to_string(), Tally::new()));
                self.rows.len() - 1
            }
        };
        self.rows[slot].1.add(inner);
    }

    pub fn get(&self, outer: &str, inner: &str) -> u64 {
        self.index
            .get(outer)
            .map(|&slot| self.rows[slot].1.get(inner))
            .unwrap_or(0)
    }
}

impl Serialize for NestedTally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for (key, row) in &self.rows {
            map.serialize_entry(key, row)?;
        }
        map.end()
    }
}
