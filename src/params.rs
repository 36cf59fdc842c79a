// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

/// An ordered, duplicate-permitting multimap of `;k=v` segment or root
/// parameters.
///
/// Not a plain key→value mapping: a segment parameter string may repeat a
/// key (`;tag=a;tag=b`), and ADL functions receive the parameters in the
/// order they were written. A `HashMap`/`BTreeMap` would lose both
/// properties, so this is a plain ordered `Vec` of pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<(String, String)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the first value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Replaces the first occurrence of `key`, or appends if absent.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value.into();
        } else {
            self.entries.push((key, value.into()));
        }
    }

    /// Always appends, even if `key` is already present.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Removes every occurrence of `key`.
    pub fn delete(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    pub fn push_raw(&mut self, key: String, value: String) {
        self.entries.push((key, value));
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl FromIterator<(String, String)> for Parameters {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_preserved_in_order() {
        let mut p = Parameters::new();
        p.append("tag", "a");
        p.append("tag", "b");
        assert_eq!(p.get("tag"), Some("a"));
        assert_eq!(p.get_all("tag").collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn set_replaces_first_occurrence_only() {
        let mut p = Parameters::new();
        p.append("tag", "a");
        p.append("tag", "b");
        p.set("tag", "z");
        assert_eq!(p.get_all("tag").collect::<Vec<_>>(), vec!["z", "b"]);
    }

    #[test]
    fn set_appends_when_absent() {
        let mut p = Parameters::new();
        p.set("schema", "CID_S");
        assert_eq!(p.get("schema"), Some("CID_S"));
    }

    #[test]
    fn delete_removes_all_occurrences() {
        let mut p = Parameters::new();
        p.append("tag", "a");
        p.append("tag", "b");
        p.delete("tag");
        assert!(!p.has("tag"));
    }
}
