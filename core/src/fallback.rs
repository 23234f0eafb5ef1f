//! Primary-then-legacy search chain.
//!
//! Two API versions coexist in production and a client cannot tell which
//! one a given deployment exposes. Search first asks the current endpoint
//! and falls back to the legacy one when that fails or finds nothing.
//! The legacy outcome is final, whatever it is.

use std::future::Future;

use crate::error::Result;
use crate::types::NormalizedResult;

pub async fn search_with_fallback<T, P, PF, L, LF>(primary: P, legacy: L) -> Result<NormalizedResult<T>>
where
    P: FnOnce() -> PF,
    PF: Future<Output = Result<NormalizedResult<T>>>,
    L: FnOnce() -> LF,
    LF: Future<Output = Result<NormalizedResult<T>>>,
{
    match primary().await {
        Ok(result) if !result.is_empty() => return Ok(result),
        Ok(_) => tracing::debug!("primary search returned no records, trying legacy endpoint"),
        Err(err) => tracing::warn!("primary search failed, trying legacy endpoint: {err}"),
    }
    legacy().await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{json, Value};

    use super::*;
    use crate::error::ApiError;
    use crate::pagination::Pagination;

    fn page(records: Vec<Value>) -> NormalizedResult {
        NormalizedResult {
            pagination: Pagination::empty(15),
            data: records,
            summary: None,
        }
    }

    #[tokio::test]
    async fn non_empty_primary_skips_legacy() {
        let legacy_calls = AtomicUsize::new(0);
        let result = search_with_fallback(
            || async { Ok(page(vec![json!({"id": 1})])) },
            || async {
                legacy_calls.fetch_add(1, Ordering::SeqCst);
                Ok(page(vec![json!({"id": 2})]))
            },
        )
        .await
        .unwrap();
        assert_eq!(result.data, vec![json!({"id": 1})]);
        assert_eq!(legacy_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn primary_error_is_swallowed() {
        let result = search_with_fallback(
            || async { Err(ApiError::Transport("Network Error".to_string())) },
            || async { Ok(page(vec![json!({"id": 5, "name": "Acme"})])) },
        )
        .await
        .unwrap();
        assert_eq!(result.data[0]["name"], "Acme");
    }

    #[tokio::test]
    async fn empty_primary_returns_empty_legacy() {
        let result = search_with_fallback(|| async { Ok(page(vec![])) }, || async { Ok(page(vec![])) })
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn legacy_error_propagates() {
        let err = search_with_fallback(
            || async { Ok(page(vec![])) },
            || async { Err::<NormalizedResult, _>(ApiError::from_status(500, None)) },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }
}
