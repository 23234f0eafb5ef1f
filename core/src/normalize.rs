//! Response normalizer.
//!
//! # Design
//! The backend has grown several list conventions over time: bare arrays,
//! `{data: [...]}` envelopes, Laravel-style paginators nested as
//! `{data: {data: [...]}}`, and older endpoints that key the list by
//! resource name (`{data: {customers: [...]}}`). `classify` resolves a raw
//! payload into one tagged `ResponseShape`; everything downstream matches on
//! the tag instead of probing the tree again.
//!
//! # Invariants
//! - Never fails. An unrecognized payload classifies as `Unrecognized` and
//!   normalizes to an empty list.
//! - `null` records are dropped.
//! - A bare array normalizes to itself minus `null` items, so feeding a
//!   normalized list back in is a no-op.

use serde_json::Value;

/// Collection keys tried, in order, when the list is keyed by resource name.
pub const DEFAULT_COLLECTION_KEYS: &[&str] = &[
    "quotations",
    "customers",
    "products",
    "suppliers",
    "expenses",
    "sales",
    "invoices",
    "purchases",
    "employees",
    "payrolls",
    "items",
    "records",
];

const SUMMARY_KEYS: &[&str] = &["summary", "statistics"];

/// Where the record list was found in a raw payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseShape<'a> {
    /// `[...]`
    BareList(&'a [Value]),
    /// `{data: [...]}`
    Enveloped(&'a [Value]),
    /// `{data: {data: [...]}}`
    DoublyNested(&'a [Value]),
    /// `{data: {<key>: [...]}}`
    Keyed { key: &'a str, records: &'a [Value] },
    Unrecognized,
}

impl<'a> ResponseShape<'a> {
    pub fn records(&self) -> &'a [Value] {
        match *self {
            ResponseShape::BareList(records)
            | ResponseShape::Enveloped(records)
            | ResponseShape::DoublyNested(records)
            | ResponseShape::Keyed { records, .. } => records,
            ResponseShape::Unrecognized => &[],
        }
    }
}

/// Result of normalizing one raw payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub data: Vec<Value>,
    pub summary: Option<Value>,
}

/// Normalizer with a configurable set of collection keys.
#[derive(Debug, Clone)]
pub struct Normalizer {
    collection_keys: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_keys(DEFAULT_COLLECTION_KEYS.iter().copied())
    }
}

impl Normalizer {
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collection_keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn collection_keys(&self) -> &[String] {
        &self.collection_keys
    }

    pub fn classify<'a>(&'a self, raw: &'a Value) -> ResponseShape<'a> {
        if let Value::Array(records) = raw {
            return ResponseShape::BareList(records);
        }
        let Some(data) = raw.get("data") else {
            return ResponseShape::Unrecognized;
        };
        if let Value::Array(records) = data {
            return ResponseShape::Enveloped(records);
        }
        if let Some(Value::Array(records)) = data.get("data") {
            return ResponseShape::DoublyNested(records);
        }
        for key in &self.collection_keys {
            if let Some(Value::Array(records)) = data.get(key.as_str()) {
                return ResponseShape::Keyed { key, records };
            }
        }
        ResponseShape::Unrecognized
    }

    pub fn normalize(&self, raw: &Value) -> Normalized {
        let shape = self.classify(raw);
        if shape == ResponseShape::Unrecognized && !raw.is_null() {
            tracing::debug!("unrecognized response shape, normalizing to an empty list");
        }
        Normalized {
            data: shape
                .records()
                .iter()
                .filter(|record| !record.is_null())
                .cloned()
                .collect(),
            summary: extract_summary(raw),
        }
    }
}

/// Normalize with the default collection keys.
pub fn normalize(raw: &Value) -> Normalized {
    Normalizer::default().normalize(raw)
}

/// The single record of a show/create response: `data` when it is an
/// object, else the payload itself when that is an object.
pub fn extract_record(raw: &Value) -> Option<&Value> {
    match raw.get("data") {
        Some(data) if data.is_object() => Some(data),
        _ => raw.is_object().then_some(raw),
    }
}

/// First summary/statistics object, preferring the unwrapped `data` level.
pub fn extract_summary(raw: &Value) -> Option<Value> {
    let data = raw.get("data");
    SUMMARY_KEYS
        .iter()
        .flat_map(|key| [data.and_then(|d| d.get(*key)), raw.get(*key)])
        .flatten()
        .find(|candidate| candidate.is_object())
        .cloned()
}
