use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{Error, Result};

/// Content type every asset is stored with.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

const KEY_EXT: &str = "pdf";

/// Lesson description, as listed by the content API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Lesson slug, unique within a run, used as the storage key prefix.
    pub lesson_slug: String,

    /// Display title, empty when absent or `null`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub lesson_title: String,

    /// Lesson document assets, in listing order.
    ///
    /// The listing is not validated field by field: a record without an asset list is still a lesson, but processing it is a lesson-level
    /// fault (see [`Lesson::assets()`]), and a malformed asset record only fails that asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<Listed<Asset>>>,
}

impl Lesson {
    /// Create a new `Lesson` without any asset.
    pub fn new(lesson_slug: impl Into<String>, lesson_title: impl Into<String>) -> Self {
        Self {
            lesson_slug: lesson_slug.into(),
            lesson_title: lesson_title.into(),
            assets: Some(vec![]),
        }
    }

    /// Build a new `Lesson` with given assets.
    #[inline]
    pub fn with_assets<I: IntoIterator<Item = Asset>>(self, iter: I) -> Self {
        Self {
            assets: Some(iter.into_iter().map(Listed::Valid).collect()),
            ..self
        }
    }

    /// Lesson assets, failing when the record came without an asset list.
    pub fn assets(&self) -> Result<&[Listed<Asset>]> {
        self.assets
            .as_deref()
            .ok_or_else(|| Error::MalformedRecord(format!("lesson `{}` has no asset list", self.lesson_slug)))
    }
}

/// Lesson document asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset type tag (e.g. `worksheet`, `exit-quiz`).
    #[serde(rename = "type")]
    pub asset_type: String,

    /// Source URL, kept verbatim so failures can report it as listed.
    pub url: String,
}

impl Asset {
    pub fn new(asset_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            asset_type: asset_type.into(),
            url: url.into(),
        }
    }
}

/// A listing record, kept even when it does not have the expected shape.
///
/// Records are converted one by one so that a malformed one only fails itself: a malformed lesson becomes a degraded lesson report and
/// a malformed asset a failed asset result. The raw record is kept to report it as listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listed<T> {
    Valid(T),
    Malformed { record: Value, error: String },
}

impl<T: DeserializeOwned> Listed<T> {
    pub fn from_record(record: Value) -> Self {
        match T::deserialize(&record) {
            Ok(value) => Self::Valid(value),
            Err(err) => Self::Malformed {
                record,
                error: err.to_string(),
            },
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Listed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_record)
    }
}

impl<T: Serialize> Serialize for Listed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valid(value) => value.serialize(serializer),
            Self::Malformed { record, .. } => record.serialize(serializer),
        }
    }
}

impl Listed<Lesson> {
    /// Lesson slug as listed, if the record carries a string one.
    pub fn lesson_slug(&self) -> Option<&str> {
        match self {
            Self::Valid(lesson) => Some(lesson.lesson_slug.as_str()),
            Self::Malformed { record, .. } => record.get("lessonSlug").and_then(Value::as_str),
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a listing payload into lesson records.
///
/// Only a payload that is not an array is an [`Error::InvalidResponse`], records are not checked any further here.
pub fn parse_listing(payload: Value) -> Result<Vec<Listed<Lesson>>> {
    match payload {
        Value::Array(records) => Ok(records.into_iter().map(Listed::from_record).collect()),
        other => Err(Error::InvalidResponse(format!("expected an array of lessons, got {}", kind(&other)))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Return the storage key of an asset: `{lesson_slug}/{asset_type}.pdf`.
pub fn asset_key(lesson_slug: &str, asset_type: &str) -> Result<String> {
    check_key_component("lesson slug", lesson_slug)?;
    check_key_component("asset type", asset_type)?;

    Ok(format!("{lesson_slug}/{asset_type}.{KEY_EXT}"))
}

/// Reject a key component that would not map to exactly one path segment.
pub(crate) fn check_key_component(component: &'static str, value: &str) -> Result<()> {
    let unsafe_char = |c: char| c == '/' || c == '\\' || c.is_control();

    if value.is_empty() || value == "." || value == ".." || value.contains(unsafe_char) {
        return Err(Error::InvalidKey {
            component,
            value: value.to_owned(),
        });
    }

    Ok(())
}
