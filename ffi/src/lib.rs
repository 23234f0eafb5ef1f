//! C-ABI wrapper around `tillbook-core`.
//!
//! # Overview
//! Exposes request building, response parsing and list normalization through
//! `extern "C"` functions, so a host with its own HTTP stack (mobile shells)
//! gets the same URLs, headers, error mapping and canonical list results as
//! the async client without linking an async runtime.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Params, bodies and results cross as JSON strings.
//! - The host owns the session. `tb_build_request` takes the token as an
//!   argument, and results flag `session_cleared` on 401 instead of
//!   touching storage.
//! - The C caller owns all returned pointers and must call the matching
//!   `tb_free_*` function to release them.
//!
//! The C header is generated into `OUT_DIR/tillbook.h` by `build.rs`.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::catch_unwind;

use serde_json::Value;
use tillbook_core::http::{HttpMethod, HttpResponse};
use tillbook_core::{clean, normalize_page, parse_response, Params, RequestBuilder, RequestOptions};

use types::*;

/// Borrow a C string; null and invalid UTF-8 read as `None`.
fn opt_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Parse an optional JSON object of params. Null or "" is no params.
fn parse_params(ptr: *const c_char) -> Result<Params, String> {
    match opt_str(ptr).map(str::trim) {
        None | Some("") => Ok(Params::new()),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => Ok(Params::from_value(value)),
            Ok(_) => Err("params must be a JSON object".to_string()),
            Err(e) => Err(format!("invalid params JSON: {e}")),
        },
    }
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client bound to `base_url`. `tenant_slug` may be null for hosts
/// that only call global endpoints.
///
/// Returns null if `base_url` is null. Free with `tb_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn tb_client_new(base_url: *const c_char, tenant_slug: *const c_char) -> *mut FfiClient {
    catch_unwind(|| {
        let Some(url) = opt_str(base_url) else {
            return std::ptr::null_mut();
        };
        let tenant_slug = opt_str(tenant_slug)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Box::into_raw(Box::new(FfiClient {
            builder: RequestBuilder::new(url),
            tenant_slug,
            normalizer: Default::default(),
            reconciler: Default::default(),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `tb_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn tb_client_free(client: *mut FfiClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

// ---------------------------------------------------------------------------
// Request building
// ---------------------------------------------------------------------------

/// Build a request.
///
/// `method` is an HTTP verb ("GET", "POST", ...). `params_json` and
/// `body_json` are JSON text or null; `token` is null when signed out.
/// Returns null on a null client or path, an unknown method, malformed
/// JSON, or a tenant-scoped call on a client without a tenant.
/// Free with `tb_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn tb_build_request(
    client: *const FfiClient,
    method: *const c_char,
    path: *const c_char,
    tenant_scoped: bool,
    params_json: *const c_char,
    body_json: *const c_char,
    token: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let (Some(method), Some(path)) = (opt_str(method).and_then(HttpMethod::parse), opt_str(path)) else {
            return std::ptr::null_mut();
        };
        let Ok(query) = parse_params(params_json) else {
            return std::ptr::null_mut();
        };
        let mut options = RequestOptions::new().query(clean(&query));
        options.tenant_scoped = tenant_scoped;
        if let Some(raw) = opt_str(body_json) {
            match serde_json::from_str(raw) {
                Ok(body) => options = options.json(body),
                Err(_) => return std::ptr::null_mut(),
            }
        }

        match client
            .builder
            .build(method, path, &options, opt_str(token), client.tenant_slug.as_deref())
        {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    HttpResponse::new(resp.status, opt_str(resp.body).unwrap_or(""))
}

/// Parse any response. On success `json` is the decoded body (`null` for
/// an empty body).
#[unsafe(no_mangle)]
pub extern "C" fn tb_parse_response(
    client: *const FfiClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiResult::null_arg("client");
        }
        if response.is_null() {
            return FfiResult::null_arg("response");
        }
        let resp = unsafe { &*response };
        match parse_response(ffi_response_to_core(resp)) {
            Ok(body) => FfiResult::ok_json(body.to_string()),
            Err(e) => FfiResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiResult::panic("panic in tb_parse_response"))
}

/// Parse a list response into a normalized result. `params_json` are the
/// params the request was built with; they fill pagination gaps.
///
/// On success `json` is `{"data": [...], "pagination": {...}, "summary"?}`.
#[unsafe(no_mangle)]
pub extern "C" fn tb_parse_page(
    client: *const FfiClient,
    response: *const FfiHttpResponse,
    params_json: *const c_char,
) -> *mut FfiResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiResult::null_arg("client");
        }
        if response.is_null() {
            return FfiResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        let requested = match parse_params(params_json) {
            Ok(params) => clean(&params),
            Err(msg) => return FfiResult::invalid_input(msg),
        };

        let raw = match parse_response(ffi_response_to_core(resp)) {
            Ok(raw) => raw,
            Err(e) => return FfiResult::from_error(e),
        };
        let page = normalize_page(&client.normalizer, &client.reconciler, &raw, &requested);
        match serde_json::to_string(&page) {
            Ok(json) => FfiResult::ok_json(json),
            Err(e) => FfiResult::invalid_input(e.to_string()),
        }
    })
    .unwrap_or_else(|_| FfiResult::panic("panic in tb_parse_page"))
}

/// Drop null and empty-string entries from a params object. Returns null
/// on malformed input. Free with `tb_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn tb_clean_params(params_json: *const c_char) -> *mut c_char {
    catch_unwind(|| match parse_params(params_json) {
        Ok(params) => c_string(clean(&params).into_value().to_string()),
        Err(_) => std::ptr::null_mut(),
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a request returned by `tb_build_request`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn tb_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        tb_free_string(req.url);
        tb_free_string(req.body);
        if !req.headers.is_null() && req.headers_len > 0 {
            let slice = std::ptr::slice_from_raw_parts_mut(req.headers, req.headers_len as usize);
            let headers = unsafe { Box::from_raw(slice) };
            for h in headers.iter() {
                tb_free_string(h.key);
                tb_free_string(h.value);
            }
        }
    });
}

/// Free a result returned by any `tb_parse_*` function. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn tb_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        tb_free_string(result.error_message);
        tb_free_string(result.json);
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn tb_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn client(tenant: Option<&str>) -> *mut FfiClient {
        let url = CString::new("http://localhost:8000").unwrap();
        let tenant = tenant.map(|t| CString::new(t).unwrap());
        tb_client_new(url.as_ptr(), tenant.as_ref().map_or(std::ptr::null(), |t| t.as_ptr()))
    }

    fn read(ptr: *const c_char) -> String {
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
    }

    fn parse_json(ptr: *const c_char) -> Value {
        serde_json::from_str(&read(ptr)).unwrap()
    }

    fn headers(req: &FfiHttpRequest) -> Vec<(String, String)> {
        let items = unsafe { std::slice::from_raw_parts(req.headers, req.headers_len as usize) };
        items.iter().map(|h| (read(h.key), read(h.value))).collect()
    }

    #[test]
    fn client_new_and_free() {
        let c = client(Some("acme"));
        assert!(!c.is_null());
        tb_client_free(c);
    }

    #[test]
    fn client_new_null_url_returns_null() {
        assert!(tb_client_new(std::ptr::null(), std::ptr::null()).is_null());
    }

    #[test]
    fn client_free_null_is_safe() {
        tb_client_free(std::ptr::null_mut());
    }

    #[test]
    fn build_tenant_list_request() {
        let c = client(Some("acme"));
        let method = CString::new("GET").unwrap();
        let path = CString::new("customers").unwrap();
        let params = CString::new(r#"{"page": 2, "search": "", "status": null}"#).unwrap();
        let token = CString::new("secret").unwrap();

        let req = tb_build_request(
            c,
            method.as_ptr(),
            path.as_ptr(),
            true,
            params.as_ptr(),
            std::ptr::null(),
            token.as_ptr(),
        );
        assert!(!req.is_null());

        let r = unsafe { &*req };
        assert!(matches!(r.method, FfiHttpMethod::Get));
        assert_eq!(read(r.url), "http://localhost:8000/api/v1/tenant/acme/customers?page=2");
        assert!(r.body.is_null());
        assert_eq!(
            headers(r),
            vec![
                ("accept".to_string(), "application/json".to_string()),
                ("authorization".to_string(), "Bearer secret".to_string()),
            ]
        );

        tb_free_request(req);
        tb_client_free(c);
    }

    #[test]
    fn build_post_carries_json_body() {
        let c = client(Some("acme"));
        let method = CString::new("post").unwrap();
        let path = CString::new("customers").unwrap();
        let body = CString::new(r#"{"name":"Zenith Books"}"#).unwrap();

        let req = tb_build_request(
            c,
            method.as_ptr(),
            path.as_ptr(),
            true,
            std::ptr::null(),
            body.as_ptr(),
            std::ptr::null(),
        );
        let r = unsafe { &*req };
        assert!(matches!(r.method, FfiHttpMethod::Post));
        assert_eq!(parse_json(r.body), serde_json::json!({"name": "Zenith Books"}));
        assert_eq!(r.headers_len, 2, "accept and content-type, no token");

        tb_free_request(req);
        tb_client_free(c);
    }

    #[test]
    fn build_tenant_request_without_tenant_returns_null() {
        let c = client(None);
        let method = CString::new("GET").unwrap();
        let path = CString::new("customers").unwrap();
        let req = tb_build_request(
            c,
            method.as_ptr(),
            path.as_ptr(),
            true,
            std::ptr::null(),
            std::ptr::null(),
            std::ptr::null(),
        );
        assert!(req.is_null());
        tb_client_free(c);
    }

    #[test]
    fn build_rejects_bad_method_and_bad_json() {
        let c = client(Some("acme"));
        let path = CString::new("customers").unwrap();
        let bogus = CString::new("FETCH").unwrap();
        let get = CString::new("GET").unwrap();
        let broken = CString::new("{not json").unwrap();

        let null = std::ptr::null();
        assert!(tb_build_request(c, bogus.as_ptr(), path.as_ptr(), true, null, null, null).is_null());
        assert!(tb_build_request(c, get.as_ptr(), path.as_ptr(), true, broken.as_ptr(), null, null).is_null());
        assert!(tb_build_request(std::ptr::null(), get.as_ptr(), path.as_ptr(), true, null, null, null).is_null());
        tb_client_free(c);
    }

    #[test]
    fn parse_page_normalizes_keyed_list() {
        let c = client(Some("acme"));
        let body = CString::new(r#"{"success":true,"data":{"customers":[{"id":1},{"id":2}]}}"#).unwrap();
        let params = CString::new(r#"{"page":1,"per_page":20}"#).unwrap();
        let resp = FfiHttpResponse {
            status: 200,
            body: body.as_ptr(),
        };

        let result = tb_parse_page(c, &resp, params.as_ptr());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert!(!r.session_cleared);

        let page = parse_json(r.json);
        assert_eq!(page["data"].as_array().unwrap().len(), 2);
        assert_eq!(page["pagination"]["per_page"], 20);
        assert_eq!(page["pagination"]["to"], 2);

        tb_free_result(result);
        tb_client_free(c);
    }

    #[test]
    fn parse_page_401_flags_session_cleared() {
        let c = client(Some("acme"));
        let body = CString::new(r#"{"message":"Unauthenticated."}"#).unwrap();
        let resp = FfiHttpResponse {
            status: 401,
            body: body.as_ptr(),
        };

        let result = tb_parse_page(c, &resp, std::ptr::null());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Unauthorized);
        assert_eq!(r.http_status, 401);
        assert!(r.session_cleared);
        assert!(r.json.is_null());
        assert!(read(r.error_message).contains("Unauthenticated."));

        tb_free_result(result);
        tb_client_free(c);
    }

    #[test]
    fn parse_response_validation_carries_field_errors() {
        let c = client(Some("acme"));
        let body = CString::new(r#"{"message":"Invalid","errors":{"name":["Required"]}}"#).unwrap();
        let resp = FfiHttpResponse {
            status: 422,
            body: body.as_ptr(),
        };

        let result = tb_parse_response(c, &resp);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Validation);
        assert_eq!(parse_json(r.json), serde_json::json!({"name": ["Required"]}));

        tb_free_result(result);
        tb_client_free(c);
    }

    #[test]
    fn parse_response_empty_body_is_null() {
        let c = client(None);
        let resp = FfiHttpResponse {
            status: 204,
            body: std::ptr::null(),
        };

        let result = tb_parse_response(c, &resp);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(read(r.json), "null");

        tb_free_result(result);
        tb_client_free(c);
    }

    #[test]
    fn parse_null_args() {
        let c = client(None);
        let resp = FfiHttpResponse {
            status: 200,
            body: std::ptr::null(),
        };

        let result = tb_parse_page(std::ptr::null(), &resp, std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        tb_free_result(result);

        let result = tb_parse_response(c, std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        tb_free_result(result);

        tb_client_free(c);
    }

    #[test]
    fn parse_page_rejects_non_object_params() {
        let c = client(None);
        let body = CString::new("[]").unwrap();
        let params = CString::new("[1,2]").unwrap();
        let resp = FfiHttpResponse {
            status: 200,
            body: body.as_ptr(),
        };

        let result = tb_parse_page(c, &resp, params.as_ptr());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::InvalidInput);

        tb_free_result(result);
        tb_client_free(c);
    }

    #[test]
    fn clean_params_drops_unset_values() {
        let params = CString::new(r#"{"q":"","page":0,"active":false,"status":null}"#).unwrap();
        let cleaned = tb_clean_params(params.as_ptr());
        assert_eq!(parse_json(cleaned), serde_json::json!({"page": 0, "active": false}));
        tb_free_string(cleaned);

        let broken = CString::new("nope").unwrap();
        assert!(tb_clean_params(broken.as_ptr()).is_null());
    }

    #[test]
    fn free_functions_accept_null() {
        tb_free_request(std::ptr::null_mut());
        tb_free_result(std::ptr::null_mut());
        tb_free_string(std::ptr::null_mut());
    }
}
