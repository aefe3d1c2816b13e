//! Set of management method names an admin grant covers.
//!
//! Stored as a sorted `TEXT[]` in the `admins` table and rebuilt into a set on read,
//! so duplicates and ordering never leak into the persisted form.

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodSet(BTreeSet<String>);

impl MethodSet {
    pub fn new() -> Self { Self(BTreeSet::new()) }

    /// Adds a method name. Names are trimmed; blank names are ignored.
    pub fn insert<S: Into<String>>(&mut self, method: S) -> bool {
        let method = method.into();
        let trimmed = method.trim();
        if trimmed.is_empty() { return false; }
        self.0.insert(trimmed.to_string())
    }

    pub fn remove(&mut self, method: &str) -> bool { self.0.remove(method.trim()) }

    /// Removes every named method, returning how many were actually present.
    pub fn remove_all<I, S>(&mut self, methods: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        methods.into_iter().filter(|m| self.remove(m.as_ref())).count()
    }

    pub fn contains(&self, method: &str) -> bool { self.0.contains(method) }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }

    /// Storage form: sorted, unique.
    pub fn to_vec(&self) -> Vec<String> { self.0.iter().cloned().collect() }
}

impl<S: Into<String>> FromIterator<S> for MethodSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = MethodSet::new();
        for m in iter { set.insert(m); }
        set
    }
}

impl From<Vec<String>> for MethodSet {
    fn from(v: Vec<String>) -> Self { v.into_iter().collect() }
}

#[cfg(test)]
#[path = "methods_tests.rs"]
mod tests;
