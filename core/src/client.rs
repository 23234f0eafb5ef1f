//! Request building, response parsing, and the async client that joins them.
//!
//! # Design
//! `RequestBuilder` and `parse_response` are pure: the first turns a method,
//! a path and options into an `HttpRequest`, the second turns an
//! `HttpResponse` into a JSON value or an `ApiError`. Hosts that run their
//! own HTTP stack (see the `tillbook-ffi` crate) use only these halves.
//!
//! `ApiClient` adds the stateful parts: reading the bearer token and tenant
//! slug from the session store, executing through a `Transport`, wiping the
//! session on 401, and normalizing list responses.

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::events::{Listeners, SessionEvent};
use crate::fallback;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::normalize::Normalizer;
use crate::pagination::Reconciler;
use crate::params::{clean, to_query_pairs, Params};
use crate::session::{SessionStore, AUTH_TOKEN, SESSION_KEYS, TENANT_SLUG};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::NormalizedResult;

pub const DEFAULT_API_PREFIX: &str = "/api/v1";

/// Per-call options for `request`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Params,
    pub body: Option<Value>,
    /// Prefix the path with `/tenant/{slug}`.
    pub tenant_scoped: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tenant() -> Self {
        Self {
            tenant_scoped: true,
            ..Self::default()
        }
    }

    pub fn query(mut self, query: Params) -> Self {
        self.query = query;
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A list endpoint plus the parameters to call it with.
#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub params: Params,
    pub tenant_scoped: bool,
}

impl Route {
    pub fn tenant(path: impl Into<String>, params: Params) -> Self {
        Self {
            path: path.into(),
            params,
            tenant_scoped: true,
        }
    }

    pub fn global(path: impl Into<String>, params: Params) -> Self {
        Self {
            path: path.into(),
            params,
            tenant_scoped: false,
        }
    }
}

/// Builds `HttpRequest` values; holds no session state.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: String,
    api_prefix: String,
}

impl RequestBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }

    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        self.api_prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path`, with the tenant prefix and cleaned query.
    pub fn url_for(&self, path: &str, tenant: Option<&str>, query: &Params) -> Result<String> {
        let mut raw = format!("{}{}", self.base_url, self.api_prefix);
        if let Some(slug) = tenant {
            raw.push_str("/tenant/");
            raw.push_str(slug.trim_matches('/'));
        }
        let path = path.trim_start_matches('/');
        if !path.is_empty() {
            raw.push('/');
            raw.push_str(path);
        }

        let mut url = Url::parse(&raw).map_err(|err| ApiError::InvalidUrl(format!("{raw}: {err}")))?;
        let pairs = to_query_pairs(query);
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url.into())
    }

    pub fn build(
        &self,
        method: HttpMethod,
        path: &str,
        options: &RequestOptions,
        token: Option<&str>,
        tenant: Option<&str>,
    ) -> Result<HttpRequest> {
        let tenant = match (options.tenant_scoped, tenant) {
            (false, _) => None,
            (true, Some(slug)) if !slug.trim().is_empty() => Some(slug),
            (true, _) => return Err(ApiError::MissingTenant),
        };
        let url = self.url_for(path, tenant, &options.query)?;

        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        let body = match &options.body {
            Some(body) => {
                headers.push(("content-type".to_string(), "application/json".to_string()));
                Some(serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?)
            }
            None => None,
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }
}

/// Decode a response body. Empty becomes `null`; non-JSON text is kept as a
/// JSON string so callers still see it.
pub fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

/// Map a response to its JSON body, or to the `ApiError` for its status.
pub fn parse_response(response: HttpResponse) -> Result<Value> {
    let body = parse_body(&response.body);
    if response.is_success() {
        return Ok(body);
    }
    Err(ApiError::from_status(
        response.status,
        (!body.is_null()).then_some(body),
    ))
}

/// Normalize a raw list payload into the canonical result.
pub fn normalize_page(
    normalizer: &Normalizer,
    reconciler: &Reconciler,
    raw: &Value,
    requested: &Params,
) -> NormalizedResult {
    let normalized = normalizer.normalize(raw);
    let pagination = reconciler.reconcile(raw, normalized.data.len(), requested);
    NormalizedResult {
        data: normalized.data,
        pagination,
        summary: normalized.summary,
    }
}

/// Async client over a `Transport` and a `SessionStore`.
pub struct ApiClient<T, S> {
    builder: RequestBuilder,
    transport: T,
    session: S,
    tenant_slug: Option<String>,
    normalizer: Normalizer,
    reconciler: Reconciler,
    session_events: Listeners<SessionEvent>,
}

impl<S: SessionStore> ApiClient<ReqwestTransport, S> {
    pub fn from_config(config: &ClientConfig, session: S) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout())?;
        let builder = RequestBuilder::new(&config.base_url).with_api_prefix(&config.api_prefix);
        let mut client = Self::new(builder, transport, session)
            .with_normalizer(Normalizer::with_keys(config.collection_keys.iter().cloned()))
            .with_reconciler(Reconciler::new(config.default_per_page));
        client.tenant_slug = config.tenant_slug.clone();
        Ok(client)
    }
}

impl<T: Transport, S: SessionStore> ApiClient<T, S> {
    pub fn new(builder: RequestBuilder, transport: T, session: S) -> Self {
        Self {
            builder,
            transport,
            session,
            tenant_slug: None,
            normalizer: Normalizer::default(),
            reconciler: Reconciler::default(),
            session_events: Listeners::new(),
        }
    }

    /// Pin the tenant instead of reading it from the session.
    pub fn with_tenant(mut self, slug: impl Into<String>) -> Self {
        self.tenant_slug = Some(slug.into());
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_reconciler(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn session_events(&self) -> &Listeners<SessionEvent> {
        &self.session_events
    }

    fn tenant_slug(&self) -> Result<String> {
        if let Some(slug) = &self.tenant_slug {
            return Ok(slug.clone());
        }
        self.session
            .get_one(TENANT_SLUG)?
            .filter(|slug| !slug.trim().is_empty())
            .ok_or(ApiError::MissingTenant)
    }

    /// Issue one request and return its JSON body.
    pub async fn request(&self, method: HttpMethod, path: &str, options: &RequestOptions) -> Result<Value> {
        let tenant = if options.tenant_scoped {
            Some(self.tenant_slug()?)
        } else {
            None
        };
        let token = self.session.get_one(AUTH_TOKEN)?;
        let request = self
            .builder
            .build(method, path, options, token.as_deref(), tenant.as_deref())?;

        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.execute(request).await?;
        tracing::debug!(status = response.status, "received response");

        let result = parse_response(response);
        if let Err(err @ ApiError::Unauthorized { .. }) = &result {
            self.invalidate_session(err);
        }
        result
    }

    fn invalidate_session(&self, err: &ApiError) {
        let event = match self.session.remove(SESSION_KEYS) {
            Ok(()) => {
                tracing::info!("session cleared after 401");
                SessionEvent::Cleared {
                    status: 401,
                    message: err.to_string(),
                }
            }
            Err(store_err) => {
                tracing::warn!("failed to clear session after 401: {store_err}");
                SessionEvent::ClearFailed {
                    status: 401,
                    message: store_err.to_string(),
                }
            }
        };
        self.session_events.publish(&event);
    }

    pub async fn get(&self, path: &str, query: Params) -> Result<Value> {
        self.request(HttpMethod::Get, path, &RequestOptions::new().query(query))
            .await
    }

    pub async fn tenant_get(&self, path: &str, query: Params) -> Result<Value> {
        self.request(HttpMethod::Get, path, &RequestOptions::tenant().query(query))
            .await
    }

    pub async fn tenant_post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.request(HttpMethod::Post, path, &RequestOptions::tenant().json(body))
            .await
    }

    /// Normalize a raw payload with this client's normalizer settings.
    pub fn normalize_page(&self, raw: &Value, requested: &Params) -> NormalizedResult {
        normalize_page(&self.normalizer, &self.reconciler, raw, requested)
    }

    /// GET a list endpoint and normalize the response.
    pub async fn fetch_page(&self, route: &Route) -> Result<NormalizedResult> {
        let query = clean(&route.params);
        let options = RequestOptions {
            query: query.clone(),
            body: None,
            tenant_scoped: route.tenant_scoped,
        };
        let raw = self.request(HttpMethod::Get, &route.path, &options).await?;
        Ok(self.normalize_page(&raw, &query))
    }

    /// Fetch `primary`; fall back to `legacy` on error or an empty list.
    pub async fn search_with_fallback(&self, primary: &Route, legacy: &Route) -> Result<NormalizedResult> {
        fallback::search_with_fallback(|| self.fetch_page(primary), || self.fetch_page(legacy)).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::session::{MemorySessionStore, TENANT_ID, USER_DATA};

    /// Transport that replays canned responses and records requests.
    #[derive(Default, Clone)]
    pub(crate) struct StubTransport {
        responses: Arc<Mutex<VecDeque<Result<HttpResponse>>>>,
        pub(crate) requests: Arc<Mutex<Vec<HttpRequest>>>,
    }

    impl StubTransport {
        pub(crate) fn reply(self, status: u16, body: Value) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(HttpResponse::new(status, body.to_string())));
            self
        }

        pub(crate) fn fail(self, message: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(ApiError::Transport(message.to_string())));
            self
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.requests.lock().unwrap().iter().map(|r| r.url.clone()).collect()
        }
    }

    impl Transport for StubTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Transport("no stubbed response".to_string())))
        }
    }

    const BASE: &str = "http://localhost:8000";

    pub(crate) fn client(transport: StubTransport) -> ApiClient<StubTransport, MemorySessionStore> {
        ApiClient::new(RequestBuilder::new(BASE), transport, MemorySessionStore::with_token("secret"))
            .with_tenant("acme")
    }

    #[test]
    fn url_includes_prefix_tenant_and_clean_query() {
        let builder = RequestBuilder::new("http://localhost:8000/");
        let query = Params::new().with("search", "").with("page", 2).with("active", false);
        let url = builder.url_for("/customers", Some("acme"), &query).unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/api/v1/tenant/acme/customers");
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("page".to_string(), "2".to_string())));
        assert!(pairs.contains(&("active".to_string(), "false".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "search"));
    }

    #[test]
    fn url_without_query_has_no_question_mark() {
        let url = RequestBuilder::new(BASE).url_for("auth/me", None, &Params::new()).unwrap();
        assert_eq!(url, "http://localhost:8000/api/v1/auth/me");
    }

    #[test]
    fn custom_api_prefix() {
        let builder = RequestBuilder::new(BASE).with_api_prefix("api/v2/");
        let url = builder.url_for("products", None, &Params::new()).unwrap();
        assert_eq!(url, "http://localhost:8000/api/v2/products");
    }

    #[test]
    fn build_attaches_bearer_only_with_token() {
        let builder = RequestBuilder::new(BASE);
        let req = builder
            .build(HttpMethod::Get, "auth/me", &RequestOptions::new(), Some("abc"), None)
            .unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer abc"));
        assert_eq!(req.header("accept"), Some("application/json"));
        assert!(req.body.is_none());

        let req = builder
            .build(HttpMethod::Get, "auth/me", &RequestOptions::new(), None, None)
            .unwrap();
        assert_eq!(req.header("authorization"), None);
    }

    #[test]
    fn build_serializes_json_body() {
        let options = RequestOptions::tenant().json(json!({"name": "Acme"}));
        let req = RequestBuilder::new(BASE)
            .build(HttpMethod::Post, "customers", &options, None, Some("acme"))
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["name"], "Acme");
    }

    #[test]
    fn tenant_scoped_without_slug_fails() {
        let err = RequestBuilder::new(BASE)
            .build(HttpMethod::Get, "customers", &RequestOptions::tenant(), None, Some("  "))
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingTenant));
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let err = RequestBuilder::new("not a url")
            .url_for("customers", None, &Params::new())
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn parse_response_handles_empty_and_text_bodies() {
        assert_eq!(parse_response(HttpResponse::new(204, "")).unwrap(), Value::Null);
        assert_eq!(
            parse_response(HttpResponse::new(200, "OK")).unwrap(),
            Value::String("OK".to_string())
        );
        let err = parse_response(HttpResponse::new(500, "<html>oops</html>")).unwrap_err();
        assert_eq!(err.to_string(), "Request failed with status code 500");
    }

    #[tokio::test]
    async fn unauthorized_clears_session_and_rejects() {
        let transport = StubTransport::default().reply(401, json!({"message": "Unauthenticated."}));
        let client = client(transport);
        client
            .session()
            .set(&[(USER_DATA, "{}"), (TENANT_SLUG, "acme"), (TENANT_ID, "9")])
            .unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        client
            .session_events()
            .subscribe(move |event: &SessionEvent| sink.lock().unwrap().push(event.clone()));

        let err = client.get("auth/me", Params::new()).await.unwrap_err();

        assert!(matches!(&err, ApiError::Unauthorized { message } if message == "Unauthenticated."));
        let remaining = client.session().get(SESSION_KEYS).unwrap();
        assert!(remaining.iter().all(Option::is_none));
        assert_eq!(
            *events.lock().unwrap(),
            vec![SessionEvent::Cleared {
                status: 401,
                message: "Unauthenticated.".to_string(),
            }]
        );
    }

    /// Store whose `remove` always fails, as a full disk would.
    struct StuckStore(MemorySessionStore);

    impl SessionStore for StuckStore {
        fn get(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
            self.0.get(keys)
        }

        fn set(&self, pairs: &[(&str, &str)]) -> Result<()> {
            self.0.set(pairs)
        }

        fn remove(&self, _keys: &[&str]) -> Result<()> {
            Err(ApiError::Session("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn failed_session_wipe_is_not_reported_as_cleared() {
        let transport = StubTransport::default().reply(401, json!({"message": "Unauthenticated."}));
        let store = StuckStore(MemorySessionStore::with_token("tok"));
        let client = ApiClient::new(RequestBuilder::new(BASE), transport, store).with_tenant("acme");
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        client
            .session_events()
            .subscribe(move |event: &SessionEvent| sink.lock().unwrap().push(event.clone()));

        let err = client.get("auth/me", Params::new()).await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert_eq!(client.session().get_one(AUTH_TOKEN).unwrap().as_deref(), Some("tok"));
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            SessionEvent::ClearFailed { status: 401, message } if message.contains("disk full")
        ));
    }

    #[tokio::test]
    async fn other_errors_leave_session_alone() {
        let transport = StubTransport::default().reply(
            422,
            json!({"message": "Invalid", "errors": {"name": ["required"]}}),
        );
        let client = client(transport);
        let err = client.tenant_post("customers", &json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { status: 422, .. }));
        assert_eq!(client.session().get_one(AUTH_TOKEN).unwrap().as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn tenant_slug_falls_back_to_session() {
        let transport = StubTransport::default().reply(200, json!([]));
        let client = ApiClient::new(RequestBuilder::new(BASE), transport, MemorySessionStore::new());
        client.session().set(&[(TENANT_SLUG, "globex")]).unwrap();
        client.tenant_get("products", Params::new()).await.unwrap();
        assert_eq!(
            client.transport().urls(),
            vec!["http://localhost:8000/api/v1/tenant/globex/products".to_string()]
        );
        let sent = client.transport().requests.lock().unwrap()[0].clone();
        assert_eq!(sent.header("authorization"), None);
    }

    #[tokio::test]
    async fn tenant_call_without_any_slug_fails_before_io() {
        let transport = StubTransport::default();
        let client = ApiClient::new(RequestBuilder::new(BASE), transport, MemorySessionStore::new());
        let err = client.tenant_get("products", Params::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingTenant));
        assert!(client.transport().urls().is_empty());
    }

    #[tokio::test]
    async fn fetch_page_normalizes_and_reconciles() {
        let transport = StubTransport::default().reply(
            200,
            json!({"success": true, "data": {"data": [{"id": 1}], "current_page": 2, "total": 25, "per_page": 10}}),
        );
        let client = client(transport);
        let route = Route::tenant("quotations", Params::new().with("page", 2).with("search", ""));
        let page = client.fetch_page(&route).await.unwrap();
        assert_eq!(page.data, vec![json!({"id": 1})]);
        assert_eq!((page.pagination.last_page, page.pagination.from, page.pagination.to), (3, 11, 11));
        assert!(!client.transport().urls()[0].contains("search"));
    }

    #[tokio::test]
    async fn search_falls_back_on_primary_transport_error() {
        let transport = StubTransport::default()
            .fail("Network Error")
            .reply(200, json!({"data": {"customers": [{"id": 5, "name": "Acme"}]}}));
        let client = client(transport);
        let result = client
            .search_with_fallback(
                &Route::tenant("customers/search", Params::new().with("q", "Ac")),
                &Route::tenant("customers", Params::new().with("search", "Ac")),
            )
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.data[0]["name"], "Acme");
        assert_eq!(client.transport().urls().len(), 2);
    }
}
