//! Pagination reconciler.
//!
//! Fills in a complete `Pagination` from whatever partial metadata the
//! server sent, the records actually returned, and the page parameters the
//! caller asked for.
//!
//! # Invariants
//! For every input: `0 <= from <= to <= total`, `last_page >= 1`,
//! `current_page >= 1`, and `current_page <= last_page` whenever
//! `total > 0`. When `total == 0`, `from == to == 0`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params::Params;

pub const DEFAULT_PER_PAGE: u64 = 15;

const MARKER_FIELDS: &[&str] = &["current_page", "last_page", "total"];

/// Complete page metadata handed to screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u64,
    pub last_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub from: u64,
    pub to: u64,
}

impl Pagination {
    pub fn empty(per_page: u64) -> Self {
        Self {
            current_page: 1,
            last_page: 1,
            per_page,
            total: 0,
            from: 0,
            to: 0,
        }
    }

    pub fn has_more(&self) -> bool {
        self.current_page < self.last_page
    }

    pub fn next_page(&self) -> Option<u64> {
        self.has_more().then(|| self.current_page + 1)
    }
}

/// Reconciles with a configurable default page size.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    default_per_page: u64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Reconciler {
    pub fn new(default_per_page: u64) -> Self {
        Self { default_per_page }
    }

    pub fn reconcile(&self, payload: &Value, records_on_page: usize, requested: &Params) -> Pagination {
        let server = locate(payload);
        let field = |name: &str| server.and_then(|obj| obj.get(name)).and_then(as_count);
        let records = records_on_page as u64;

        let total = field("total").unwrap_or(records);
        let per_page = field("per_page")
            .or_else(|| requested_count(requested, "per_page"))
            .or_else(|| requested_count(requested, "limit"))
            .or_else(|| (records > 0).then_some(records))
            .unwrap_or(self.default_per_page);
        let mut current_page = field("current_page")
            .or_else(|| requested_count(requested, "page"))
            .unwrap_or(1)
            .max(1);
        let last_page = field("last_page")
            .unwrap_or_else(|| total.div_ceil(per_page.max(1)))
            .max(1);
        if total > 0 {
            current_page = current_page.min(last_page);
        }

        if total == 0 {
            return Pagination {
                current_page,
                last_page,
                per_page,
                total,
                from: 0,
                to: 0,
            };
        }

        let derived_from = (current_page - 1).saturating_mul(per_page).saturating_add(1);
        let from = match field("from") {
            Some(from) => from,
            None if records == 0 => 0,
            None => derived_from,
        };
        let to = match field("to") {
            Some(to) => to,
            None if records == 0 => 0,
            None => total.min(from.saturating_add(records - 1)),
        };
        let to = to.min(total);
        let from = from.min(to);

        Pagination {
            current_page,
            last_page,
            per_page,
            total,
            from,
            to,
        }
    }
}

/// Reconcile with the default page size.
pub fn reconcile(payload: &Value, records_on_page: usize, requested: &Params) -> Pagination {
    Reconciler::default().reconcile(payload, records_on_page, requested)
}

/// First object in the payload that looks like pagination metadata.
fn locate(payload: &Value) -> Option<&Map<String, Value>> {
    let data = payload.get("data");
    [
        data.and_then(|d| d.get("pagination")),
        data.and_then(|d| d.get("meta")),
        payload.get("pagination"),
        payload.get("meta"),
        data,
        Some(payload),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_object)
    .find(|obj| MARKER_FIELDS.iter().any(|key| obj.contains_key(*key)))
}

/// Non-negative integer from a JSON number or numeric string.
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn requested_count(params: &Params, key: &str) -> Option<u64> {
    params.get(key).and_then(as_count)
}
