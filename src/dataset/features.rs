use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Maps the raw feature keys found in the input to dense parameter indices.
///
/// Indices are handed out in first-seen order. The bias takes the slot right after the
/// last feature, so a model over this index has `f_size()` parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureIndex {
    keys: Vec<String>,
    #[serde(skip)]
    lookup: HashMap<String, usize>,
}

impl FeatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an index from its keys, in index order.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::new();
        for key in keys {
            let key: String = key.into();
            index.get_or_insert(&key);
        }

        index
    }

    /// Returns the index of `key`, assigning the next free one if it's new.
    pub fn get_or_insert(&mut self, key: &str) -> usize {
        if let Some(&idx) = self.lookup.get(key) {
            return idx;
        }

        let idx = self.keys.len();
        self.keys.push(key.to_owned());
        self.lookup.insert(key.to_owned(), idx);
        idx
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    /// The raw key behind a dense index.
    pub fn key(&self, idx: usize) -> Option<&str> {
        self.keys.get(idx).map(String::as_str)
    }

    /// The number of distinct features.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The amount of parameters a model over this index needs, bias included.
    pub fn f_size(&self) -> usize {
        self.keys.len() + 1
    }

    pub fn bias_index(&self) -> usize {
        self.keys.len()
    }

    /// Restores the reverse lookup after deserialization.
    pub(crate) fn rebuild_lookup(&mut self) {
        self.lookup = self
            .keys
            .iter()
            .enumerate()
            .map(|(idx, key)| (key.clone(), idx))
            .collect();
    }
}
