//! Header store mirrored to the host on every forwarded call.
//!
//! Keys are stored exactly as given (no canonicalization). Each key maps to
//! an ordered list of values; order among keys carries no meaning.

use std::collections::hash_map;
use std::collections::HashMap;

use crate::message::Header;

/// Ordered multi-value mapping from header name to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: HashMap<String, Vec<String>>,
}

impl HeaderMap {
    /// Create an empty header store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to `key`, keeping previously added values.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// Replace all values of `key` with a single value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), vec![value.into()]);
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of `key` in insertion order (empty if absent).
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct access to the value list of `key`.
    pub fn values_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        self.entries.get_mut(key)
    }

    /// Remove `key`, returning its values.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.entries.remove(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of distinct keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over `(key, values)` pairs in unspecified key order.
    pub fn iter(&self) -> hash_map::Iter<'_, String, Vec<String>> {
        self.entries.iter()
    }

    /// Copy the current state into wire headers, one entry per key.
    pub fn snapshot(&self) -> Vec<Header> {
        self.entries
            .iter()
            .map(|(key, values)| Header {
                key: key.clone(),
                values: values.clone(),
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = hash_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (key, value) in iter {
            map.add(key, value);
        }
        map
    }
}
