//! Query parameter builder.
//!
//! Screens hand over filter objects with plenty of unset fields (an empty
//! search box, a cleared date picker). `clean` strips those before the query
//! string is built; everything else passes through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An ordered-by-key map of query parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert only when `value` is `Some`.
    pub fn with_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Merge `other` on top of `self`; keys in `other` win.
    pub fn merged(mut self, other: &Params) -> Self {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }

    /// Params from an arbitrary JSON value. Anything but an object yields an
    /// empty map.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Drop keys whose value is `null` or `""`. `0` and `false` survive.
pub fn clean(params: &Params) -> Params {
    params
        .iter()
        .filter(|(_, value)| !is_unset(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Serialize cleaned params into query pairs.
///
/// Arrays expand to repeated `key[]` pairs, nested objects are sent as
/// compact JSON.
pub fn to_query_pairs(params: &Params) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len());
    for (key, value) in clean(params).iter() {
        match value {
            Value::Array(items) => {
                let name = format!("{key}[]");
                pairs.extend(
                    items
                        .iter()
                        .filter(|item| !is_unset(item))
                        .map(|item| (name.clone(), scalar_to_string(item))),
                );
            }
            other => pairs.push((key.clone(), scalar_to_string(other))),
        }
    }
    pairs
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
