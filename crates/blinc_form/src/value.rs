//! Form value trees
//!
//! Every piece of form data (values, errors, touched flags, status) is a
//! [`FormValue`]: a tagged tree of mappings, sequences and scalars.
//!
//! Containers are reference counted, so cloning a tree is cheap and a new
//! snapshot produced by [`crate::path::set_in`] shares every untouched
//! subtree with the previous one. [`FormValue::ptr_eq`] exposes that
//! identity, which is what selector subscriptions use to skip work.
//!
//! # Example
//!
//! ```rust
//! use blinc_form::FormValue;
//! use serde_json::json;
//!
//! let values = FormValue::from(json!({
//!     "username": "ian",
//!     "friends": [{ "name": "A" }, { "name": "B" }],
//! }));
//!
//! assert_eq!(values.get("username").and_then(FormValue::as_str), Some("ian"));
//! assert!(values.get("friends").is_some_and(FormValue::is_list));
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::tree::deep_equal;

/// Ordered mapping node contents
pub type FormMap = IndexMap<String, FormValue>;

/// A node in a form value tree
#[derive(Clone, Default)]
pub enum FormValue {
    /// Absent / explicitly undefined
    #[default]
    Undefined,
    /// Explicit null
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    /// Mapping from keys to child nodes, in insertion order
    Map(Arc<FormMap>),
    /// Sequence of child nodes, possibly sparse (holes are `Undefined`)
    List(Arc<Vec<FormValue>>),
}

impl FormValue {
    /// An empty mapping
    pub fn map() -> Self {
        FormValue::Map(Arc::new(FormMap::new()))
    }

    /// An empty sequence
    pub fn list() -> Self {
        FormValue::List(Arc::new(Vec::new()))
    }

    /// Build a mapping from key/value pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<FormValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        FormValue::Map(Arc::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, FormValue::Undefined)
    }

    /// `Undefined` or `Null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, FormValue::Undefined | FormValue::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, FormValue::Map(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FormValue::List(_))
    }

    /// Whether this node is a mapping or a sequence
    pub fn is_container(&self) -> bool {
        self.is_map() || self.is_list()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FormValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FormValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&FormMap> {
        match self {
            FormValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FormValue]> {
        match self {
            FormValue::List(list) => Some(list),
            _ => None,
        }
    }

    /// Direct child lookup by a single key (mapping key or sequence index)
    pub fn get(&self, key: &str) -> Option<&FormValue> {
        match self {
            FormValue::Map(map) => map.get(key),
            FormValue::List(list) => crate::path::as_index(key).and_then(|i| list.get(i)),
            _ => None,
        }
    }

    /// Number of direct children (0 for scalars)
    pub fn len(&self) -> usize {
        match self {
            FormValue::Map(map) => map.len(),
            FormValue::List(list) => list.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JavaScript-like truthiness, used by checkbox handling
    pub fn is_truthy(&self) -> bool {
        match self {
            FormValue::Undefined | FormValue::Null => false,
            FormValue::Bool(b) => *b,
            FormValue::Number(n) => *n != 0.0 && !n.is_nan(),
            FormValue::String(s) => !s.is_empty(),
            FormValue::Map(_) | FormValue::List(_) => true,
        }
    }

    /// Reference identity for containers, value equality for scalars
    pub fn ptr_eq(&self, other: &FormValue) -> bool {
        match (self, other) {
            (FormValue::Map(a), FormValue::Map(b)) => Arc::ptr_eq(a, b),
            (FormValue::List(a), FormValue::List(b)) => Arc::ptr_eq(a, b),
            (a, b) if !a.is_container() && !b.is_container() => deep_equal(a, b),
            _ => false,
        }
    }

    /// Convert to a JSON value. `Undefined` map entries are dropped and
    /// `Undefined` sequence slots become `null`, as JSON has no undefined.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            FormValue::Undefined | FormValue::Null => Json::Null,
            FormValue::Bool(b) => Json::Bool(*b),
            FormValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            FormValue::String(s) => Json::String(s.to_string()),
            FormValue::Map(map) => Json::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            FormValue::List(list) => Json::Array(list.iter().map(FormValue::to_json).collect()),
        }
    }
}

impl PartialEq for FormValue {
    fn eq(&self, other: &Self) -> bool {
        deep_equal(self, other)
    }
}

impl fmt::Debug for FormValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormValue::Undefined => write!(f, "undefined"),
            FormValue::Null => write!(f, "null"),
            FormValue::Bool(b) => write!(f, "{}", b),
            FormValue::Number(n) => write!(f, "{}", n),
            FormValue::String(s) => write!(f, "{:?}", s),
            FormValue::Map(map) => f.debug_map().entries(map.iter()).finish(),
            FormValue::List(list) => f.debug_list().entries(list.iter()).finish(),
        }
    }
}

impl fmt::Display for FormValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormValue::Undefined => Ok(()),
            FormValue::String(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions
// ─────────────────────────────────────────────────────────────────────────────

impl From<bool> for FormValue {
    fn from(value: bool) -> Self {
        FormValue::Bool(value)
    }
}

impl From<f64> for FormValue {
    fn from(value: f64) -> Self {
        FormValue::Number(value)
    }
}

impl From<i32> for FormValue {
    fn from(value: i32) -> Self {
        FormValue::Number(value as f64)
    }
}

impl From<i64> for FormValue {
    fn from(value: i64) -> Self {
        FormValue::Number(value as f64)
    }
}

impl From<u32> for FormValue {
    fn from(value: u32) -> Self {
        FormValue::Number(value as f64)
    }
}

impl From<usize> for FormValue {
    fn from(value: usize) -> Self {
        FormValue::Number(value as f64)
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::String(Arc::from(value))
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        FormValue::String(Arc::from(value))
    }
}

impl<T: Into<FormValue>> From<Option<T>> for FormValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FormValue::Undefined)
    }
}

impl<T: Into<FormValue>> From<Vec<T>> for FormValue {
    fn from(value: Vec<T>) -> Self {
        FormValue::List(Arc::new(value.into_iter().map(Into::into).collect()))
    }
}

impl From<FormMap> for FormValue {
    fn from(value: FormMap) -> Self {
        FormValue::Map(Arc::new(value))
    }
}

impl From<serde_json::Value> for FormValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Json::Null => FormValue::Null,
            Json::Bool(b) => FormValue::Bool(b),
            Json::Number(n) => FormValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => FormValue::from(s),
            Json::Array(items) => {
                FormValue::List(Arc::new(items.into_iter().map(FormValue::from).collect()))
            }
            Json::Object(entries) => FormValue::Map(Arc::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, FormValue::from(v)))
                    .collect(),
            )),
        }
    }
}

impl From<&FormValue> for serde_json::Value {
    fn from(value: &FormValue) -> Self {
        value.to_json()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serde
// ─────────────────────────────────────────────────────────────────────────────

impl Serialize for FormValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FormValue::Undefined | FormValue::Null => serializer.serialize_unit(),
            FormValue::Bool(b) => serializer.serialize_bool(*b),
            FormValue::Number(n) => serializer.serialize_f64(*n),
            FormValue::String(s) => serializer.serialize_str(s),
            FormValue::Map(map) => {
                let defined = map.values().filter(|v| !v.is_undefined()).count();
                let mut out = serializer.serialize_map(Some(defined))?;
                for (key, value) in map.iter().filter(|(_, v)| !v.is_undefined()) {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            FormValue::List(list) => {
                let mut out = serializer.serialize_seq(Some(list.len()))?;
                for item in list.iter() {
                    out.serialize_element(item)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for FormValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(FormValue::from)
    }
}
