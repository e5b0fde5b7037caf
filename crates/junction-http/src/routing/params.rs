//! Captured route parameters.
//!
//! A [`Params`] set maps [`ParamKey`]s to decoded strings. Named tokens
//! (`:id`) produce [`ParamKey::Name`] keys; unnamed captures (`*`, bare
//! groups, unnamed regex groups) produce [`ParamKey::Index`] keys numbered
//! from zero in pattern order.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// The key of one captured parameter.
///
/// Positional keys order before named keys, so iteration visits `0`, `1`, …
/// first and then names alphabetically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamKey {
    /// An unnamed capture, numbered in pattern order.
    Index(usize),
    /// A named capture.
    Name(String),
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for ParamKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// The parameters visible to a handler.
///
/// Serializes as a JSON object whose keys are the parameter names, with
/// positional keys rendered as decimal strings.
///
/// # Examples
///
/// ```
/// use junction_http::routing::Params;
///
/// let mut params = Params::new();
/// params.insert("user", "tj");
/// params.insert(0, "edit");
/// assert_eq!(params.get("user"), Some("tj"));
/// assert_eq!(params.index(0), Some("edit"));
/// assert_eq!(serde_json::to_string(&params).unwrap(), r#"{"0":"edit","user":"tj"}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: BTreeMap<ParamKey, String>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value under the same key.
    pub fn insert(&mut self, key: impl Into<ParamKey>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Returns a named parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&ParamKey::Name(name.to_string()))
            .map(String::as_str)
    }

    /// Returns a positional parameter.
    pub fn index(&self, index: usize) -> Option<&str> {
        self.entries.get(&ParamKey::Index(index)).map(String::as_str)
    }

    /// Returns the value under any key.
    pub fn get_key(&self, key: &ParamKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&mut self, key: &ParamKey) -> Option<String> {
        self.entries.remove(key)
    }

    /// Returns true if `key` has a value.
    pub fn contains_key(&self, key: &ParamKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of captured values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the parameters, positional keys first.
    pub fn iter(&self) -> impl Iterator<Item = (&ParamKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Returns the positional values as `(index, value)` pairs.
    pub fn positional(&self) -> Vec<(usize, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| match k {
                ParamKey::Index(i) => Some((*i, v.as_str())),
                ParamKey::Name(_) => None,
            })
            .collect()
    }

    fn next_free_index(&self) -> usize {
        self.entries
            .keys()
            .filter_map(|k| match k {
                ParamKey::Index(i) => Some(*i + 1),
                ParamKey::Name(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Overlays these (child) parameters on `parent`.
    ///
    /// Named keys collide in favour of the child. When both sets carry a
    /// positional value at index `0`, the child's positional values are
    /// renumbered to start right after the parent's highest index, so both
    /// sets survive. Applied once per mount level, a request passing through
    /// several routers accumulates positional values strictly in mount depth
    /// order, outermost first.
    ///
    /// # Examples
    ///
    /// ```
    /// use junction_http::routing::Params;
    ///
    /// let mut parent = Params::new();
    /// parent.insert(0, "10");
    /// let mut child = Params::new();
    /// child.insert(0, "profile");
    /// child.insert(1, "json");
    ///
    /// let merged = child.merged_over(&parent);
    /// assert_eq!(merged.index(0), Some("10"));
    /// assert_eq!(merged.index(1), Some("profile"));
    /// assert_eq!(merged.index(2), Some("json"));
    /// ```
    #[must_use]
    pub fn merged_over(self, parent: &Self) -> Self {
        if parent.is_empty() {
            return self;
        }

        let zero = ParamKey::Index(0);
        let mut merged = parent.clone();
        if !(self.contains_key(&zero) && parent.contains_key(&zero)) {
            merged.entries.extend(self.entries);
            return merged;
        }

        let offset = parent.next_free_index();
        for (key, value) in self.entries {
            let key = match key {
                ParamKey::Index(i) => ParamKey::Index(i + offset),
                named @ ParamKey::Name(_) => named,
            };
            merged.entries.insert(key, value);
        }
        merged
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(&key.to_string(), value)?;
        }
        map.end()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a ParamKey, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, ParamKey, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
