//! Caller-supplied answers, keyed by schema field id

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    List(Vec<Scalar>),
    Scalar(Scalar),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Scalar(Scalar::Text(value.into()))
    }

    /// Text to write into the document. Lists are joined with ", ".
    /// `None` for null, which counts as "no value".
    pub fn render(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Scalar(s) => Some(s.to_string()),
            FieldValue::List(items) => Some(
                items
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        }
    }
}

/// Ordered map from field id to value. Iteration follows insertion order,
/// which is the order overflow entries are written in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData {
    values: IndexMap<String, FieldValue>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: FieldValue) {
        self.values.insert(id.into(), value);
    }

    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.values.get(id)
    }

    /// Rendered value for `id`, if one is present and non-null.
    pub fn present_value(&self, id: &str) -> Option<String> {
        self.values.get(id).and_then(FieldValue::render)
    }

    /// Present (non-null) entries in insertion order, rendered to text.
    pub fn present(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.values
            .iter()
            .filter_map(|(id, v)| v.render().map(|text| (id.as_str(), text)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
