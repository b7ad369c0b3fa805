//! Core data types shared by the storage interfaces
//!
//! - `Tag` / `Tags`: the tag set identifying a series
//! - `SeriesEntry`: one item produced by a result set

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::query::{FIELD_TAG_KEY, MEASUREMENT_TAG_KEY};
use crate::storage::cursor::Cursor;

/// A single tag key/value pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered tag set of a series
///
/// Iteration order is the order the engine produced the tags in; keys are
/// assumed unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new(tags: Vec<Tag>) -> Self {
        Self(tags)
    }

    /// Build a tag set sorted by key
    pub fn sorted<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut tags: Vec<Tag> = pairs.into_iter().map(|(k, v)| Tag::new(k, v)).collect();
        tags.sort();
        Self(tags)
    }

    /// Value for `key`, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy without the engine-reserved `_measurement` and `_field` tags
    pub fn without_system_tags(&self) -> Tags {
        Tags(
            self.0
                .iter()
                .filter(|t| t.key != MEASUREMENT_TAG_KEY && t.key != FIELD_TAG_KEY)
                .cloned()
                .collect(),
        )
    }
}

impl From<Vec<Tag>> for Tags {
    fn from(tags: Vec<Tag>) -> Self {
        Self(tags)
    }
}

impl IntoIterator for Tags {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", tag.key, tag.value)?;
        }
        f.write_str("}")
    }
}

/// One series produced by a result set. `cursor` is `None` when the series
/// key matched but holds no data in the requested range.
#[derive(Debug)]
pub struct SeriesEntry {
    pub tags: Tags,
    pub cursor: Option<Cursor>,
}

impl SeriesEntry {
    pub fn new(tags: Tags, cursor: Option<Cursor>) -> Self {
        Self { tags, cursor }
    }
}
