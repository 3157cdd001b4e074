//! Attribute sets
//!
//! Configuration values resolved per scope. Merging is copy-on-merge: a
//! merge always produces a new set, and keys already present in the base are
//! never overwritten, so the order scopes are merged in defines precedence.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::PurserResult;
use crate::parser::Attribute;
use crate::render;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Attributes::default()
    }

    /// Collect the pairs of one parsed attribute node.
    pub fn from_ast(attrs: &[Attribute]) -> Self {
        attrs
            .iter()
            .map(|a| (a.key.clone(), a.value.clone()))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Merge `overlay` into a copy of `self`.
    ///
    /// Keys already present win; keys only in `overlay` are added, each
    /// value rendered against the base so a weaker scope can reference
    /// values from the stronger scopes it is merged into. A reference to an
    /// undefined key fails here, not at use time.
    pub fn merge(&self, overlay: &Attributes) -> PurserResult<Attributes> {
        let mut merged = self.clone();
        for (key, value) in overlay.iter() {
            if merged.contains_key(key) {
                continue;
            }
            let rendered = render::render_str(&format!("attribute {key}"), value, self)?;
            merged.insert(key.clone(), rendered);
        }
        Ok(merged)
    }
}

impl FromIterator<(String, String)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Attributes(iter.into_iter().collect())
    }
}
