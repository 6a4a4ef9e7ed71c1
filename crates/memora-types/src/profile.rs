//! Personal records and the flattened, prompt-ready [`Profile`].
//!
//! A [`PersonalRecord`] is one row of open-schema personal data: any column
//! present in the source becomes a field.  A [`Profile`] is the ordered view
//! built from it plus the latest image memory; it serializes as a JSON
//! object whose keys keep their insertion order.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::MemoryRecord;

/// Key under which the image memory is always stored in a [`Profile`].
pub const IMAGE_MEMORY_KEY: &str = "Image Memory";

// ─────────────────────────────────────────────────────────────────────────────
// PersonalRecord
// ─────────────────────────────────────────────────────────────────────────────

/// A single value of a personal record column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Real(v) => write!(f, "{v}"),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Real(v)
    }
}

/// One logical row of personal data with an open field set.
///
/// Field order is the column order of the source row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonalRecord {
    fields: Vec<(String, FieldValue)>,
}

impl PersonalRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, replacing the value of an existing field with the
    /// same name in place.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style variant of [`push`][Self::push].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ImageMemory
// ─────────────────────────────────────────────────────────────────────────────

/// Prompt-ready view of one [`MemoryRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMemory {
    #[serde(rename = "Image Path")]
    pub image_path: String,
    #[serde(rename = "Caption")]
    pub caption: String,
    #[serde(rename = "Scene")]
    pub scene: String,
    #[serde(rename = "People Count")]
    pub people_count: u32,
    #[serde(rename = "Objects")]
    pub objects: String,
    #[serde(rename = "Detected Text")]
    pub detected_text: String,
}

impl From<&MemoryRecord> for ImageMemory {
    fn from(record: &MemoryRecord) -> Self {
        Self {
            image_path: record.image_path.clone(),
            caption: record.caption.clone(),
            scene: record.scene.clone(),
            people_count: record.people_count,
            objects: record.objects_joined(),
            detected_text: record.text_joined(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// A value stored under a [`Profile`] key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProfileValue {
    Text(String),
    ImageMemory(ImageMemory),
}

/// Flattened profile combining personal fields and the latest image memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    entries: Vec<(String, ProfileValue)>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`.  An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: ProfileValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ProfileValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Text value of `key`, if present and textual.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(ProfileValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn image_memory(&self) -> Option<&ImageMemory> {
        match self.get(IMAGE_MEMORY_KEY) {
            Some(ProfileValue::ImageMemory(m)) => Some(m),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProfileValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Profile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
