//! Structured key/value storage views.
//!
//! Persistence code reads through [`ReadView`] and writes through [`WriteView`]:
//! typed scalar fields, nested child views and ordered lists of child views.
//! A missing field and a field of the wrong type both read as absent, so
//! decoders apply their own defaults.
//!
//! [`Compound`] is the in-memory implementation. It serializes to JSON bytes
//! with ordered keys, so equal trees always produce identical bytes.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while turning stored bytes into views or claims.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Bytes were not a valid serialized [`Compound`].
    #[error("malformed storage data: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing a storage file failed.
    #[error("storage i/o failed: {0}")]
    Io(#[from] io::Error),

    /// A required field was absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A field was present but held an unusable value.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// Read access to one level of structured storage.
pub trait ReadView {
    /// 32-bit integer field.
    fn get_int(&self, key: &str) -> Option<i32>;

    /// 64-bit integer field.
    fn get_long(&self, key: &str) -> Option<i64>;

    /// Boolean field.
    fn get_bool(&self, key: &str) -> Option<bool>;

    /// String field.
    fn get_str(&self, key: &str) -> Option<&str>;

    /// Nested view stored under `key`.
    fn child(&self, key: &str) -> Option<&Self>;

    /// Ordered child views stored under `key`; empty when absent.
    fn list(&self, key: &str) -> &[Self]
    where
        Self: Sized;
}

/// Write access to one level of structured storage.
pub trait WriteView {
    /// Stores a 32-bit integer.
    fn put_int(&mut self, key: &str, value: i32);

    /// Stores a 64-bit integer.
    fn put_long(&mut self, key: &str, value: i64);

    /// Stores a boolean.
    fn put_bool(&mut self, key: &str, value: bool);

    /// Stores a string.
    fn put_str(&mut self, key: &str, value: &str);

    /// Nested view under `key`, created empty if absent or not a view.
    fn child_mut(&mut self, key: &str) -> &mut Self;

    /// Appends an empty child view to the list under `key` and returns it.
    fn push_list(&mut self, key: &str) -> &mut Self;
}

/// One stored scalar value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Tag {
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// Boolean.
    Bool(bool),
    /// String.
    Str(String),
}

/// In-memory hierarchical storage view with ordered keys.
///
/// Scalars, child views and lists share one key space: writing any of them
/// under a key discards whatever else was stored there.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compound {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    values: BTreeMap<String, Tag>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<String, Compound>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    lists: BTreeMap<String, Vec<Compound>>,
}

impl Compound {
    /// Creates an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields at this level.
    pub fn len(&self) -> usize {
        self.values.len() + self.children.len() + self.lists.len()
    }

    /// Whether this level has no fields.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scalar stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.values.get(key)
    }

    /// Stores a scalar, returning the scalar it replaced.
    pub fn insert(&mut self, key: &str, tag: Tag) -> Option<Tag> {
        drop(self.children.remove(key));
        drop(self.lists.remove(key));
        self.values.insert(key.to_owned(), tag)
    }

    /// Removes whatever is stored under `key`. Returns false if nothing was.
    pub fn remove(&mut self, key: &str) -> bool {
        let value = self.values.remove(key).is_some();
        let child = self.children.remove(key).is_some();
        let list = self.lists.remove(key).is_some();
        value || child || list
    }

    /// Field names: scalars, then child views, then lists, each group in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .chain(self.children.keys())
            .chain(self.lists.keys())
            .map(String::as_str)
    }

    fn put(&mut self, key: &str, tag: Tag) {
        drop(self.insert(key, tag));
    }

    /// Serializes the view to bytes.
    ///
    /// # Errors
    /// Returns [`StorageError::Json`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses a view previously produced by [`Compound::to_bytes`].
    ///
    /// # Errors
    /// Returns [`StorageError::Json`] if the bytes are not a serialized view.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Writes the view to a file, replacing its contents.
    ///
    /// # Errors
    /// Returns [`StorageError`] on serialization or i/o failure.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), StorageError> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Reads a view from a file written by [`Compound::write_to`].
    ///
    /// # Errors
    /// Returns [`StorageError`] if the file cannot be read or parsed.
    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::from_bytes(&fs::read(path)?)
    }
}

impl ReadView for Compound {
    fn get_int(&self, key: &str) -> Option<i32> {
        match self.values.get(key)? {
            Tag::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn get_long(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            Tag::Long(v) => Some(*v),
            Tag::Int(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            Tag::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            Tag::Str(v) => Some(v),
            _ => None,
        }
    }

    fn child(&self, key: &str) -> Option<&Self> {
        self.children.get(key)
    }

    fn list(&self, key: &str) -> &[Self] {
        self.lists.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

impl WriteView for Compound {
    fn put_int(&mut self, key: &str, value: i32) {
        self.put(key, Tag::Int(value));
    }

    fn put_long(&mut self, key: &str, value: i64) {
        self.put(key, Tag::Long(value));
    }

    fn put_bool(&mut self, key: &str, value: bool) {
        self.put(key, Tag::Bool(value));
    }

    fn put_str(&mut self, key: &str, value: &str) {
        self.put(key, Tag::Str(value.to_owned()));
    }

    fn child_mut(&mut self, key: &str) -> &mut Self {
        drop(self.values.remove(key));
        drop(self.lists.remove(key));
        self.children.entry(key.to_owned()).or_default()
    }

    fn push_list(&mut self, key: &str) -> &mut Self {
        drop(self.values.remove(key));
        drop(self.children.remove(key));
        let items = self.lists.entry(key.to_owned()).or_default();
        let last = items.len();
        items.push(Self::new());
        &mut items[last]
    }
}
