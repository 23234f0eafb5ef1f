//! Canonical result shape and domain DTOs.
//!
//! # Design
//! `NormalizedResult` is what every list screen consumes regardless of the
//! raw shape the backend returned. Domain DTOs keep only the fields the app
//! reads by name and park everything else in a flattened `extra` map, so a
//! backend adding fields never breaks decoding.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pagination::Pagination;

/// The common `{success, message, data}` wrapper. Not every endpoint uses it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Canonical list result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult<T = Value> {
    pub data: Vec<T>,
    pub pagination: Pagination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
}

impl<T> NormalizedResult<T> {
    pub fn empty(per_page: u64) -> Self {
        Self {
            data: Vec::new(),
            pagination: Pagination::empty(per_page),
            summary: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> NormalizedResult<U> {
        NormalizedResult {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
            summary: self.summary,
        }
    }
}

impl NormalizedResult<Value> {
    /// Decode every record into `T`. Records that do not decode are dropped
    /// and logged; pagination and summary are kept as they are.
    pub fn into_typed<T: DeserializeOwned>(self) -> NormalizedResult<T> {
        let data = self
            .data
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<T>(record) {
                Ok(typed) => Some(typed),
                Err(err) => {
                    tracing::warn!(
                        record_type = std::any::type_name::<T>(),
                        "dropping record that failed to decode: {err}"
                    );
                    None
                }
            })
            .collect();
        NormalizedResult {
            data,
            pagination: self.pagination,
            summary: self.summary,
        }
    }
}

/// Structured error body sent by the backend on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient_errors")]
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<String> {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    }
}

/// Accepts `{field: ["msg", ...]}` as well as `{field: "msg"}`; anything
/// else becomes an empty map.
fn lenient_errors<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(map) = value else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .into_iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                Value::String(message) => vec![message],
                _ => Vec::new(),
            };
            (field, messages)
        })
        .collect())
}

/// Ids arrive as numbers from current endpoints and as strings from a few
/// legacy ones.
fn lenient_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().ok_or_else(|| D::Error::custom("id must be non-negative")),
        Value::String(s) => s.trim().parse().map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("unexpected id: {other}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(deserialize_with = "lenient_id")]
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    #[serde(deserialize_with = "lenient_id")]
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(deserialize_with = "lenient_id")]
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    #[serde(deserialize_with = "lenient_id")]
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quotation_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(deserialize_with = "lenient_id")]
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn into_typed_drops_undecodable_records() {
        let result = NormalizedResult {
            data: vec![
                json!({"id": 5, "name": "Acme"}),
                json!({"id": "6", "name": "Globex", "city": "Springfield"}),
                json!({"name": "no id"}),
            ],
            pagination: Pagination::empty(15),
            summary: None,
        };
        let typed: NormalizedResult<Customer> = result.into_typed();
        assert_eq!(typed.len(), 2);
        assert_eq!(typed.data[0].name, "Acme");
        assert_eq!(typed.data[1].id, 6);
        assert_eq!(typed.data[1].extra["city"], "Springfield");
    }

    #[test]
    fn error_body_prefers_message_over_error() {
        let body: ErrorBody =
            serde_json::from_value(json!({"message": "Invalid", "error": "other"})).unwrap();
        assert_eq!(body.message().as_deref(), Some("Invalid"));
        let body: ErrorBody = serde_json::from_value(json!({"error": "  nope  "})).unwrap();
        assert_eq!(body.message().as_deref(), Some("nope"));
        let body: ErrorBody = serde_json::from_value(json!({"message": "   "})).unwrap();
        assert_eq!(body.message(), None);
    }

    #[test]
    fn error_map_accepts_strings_and_lists() {
        let body: ErrorBody = serde_json::from_value(json!({
            "errors": {"email": "taken", "name": ["required", 3]}
        }))
        .unwrap();
        assert_eq!(body.errors["email"], vec!["taken".to_string()]);
        assert_eq!(body.errors["name"], vec!["required".to_string()]);
    }

    #[test]
    fn envelope_fields_are_optional() {
        let env: Envelope = serde_json::from_value(json!({"data": [1]})).unwrap();
        assert!(env.success.is_none());
        assert_eq!(env.data, Some(json!([1])));
    }

    #[test]
    fn normalized_result_serializes_without_empty_summary() {
        let result: NormalizedResult = NormalizedResult::empty(15);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("summary").is_none());
        assert_eq!(json["pagination"]["per_page"], 15);
    }
}
