//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! enums with explicit discriminants. Payloads cross as JSON strings, since
//! list records have no fixed schema. Conversion functions live here to keep
//! `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use tillbook_core::error::ApiError;
use tillbook_core::http::HttpMethod;
use tillbook_core::{Normalizer, Reconciler, RequestBuilder};

/// Opaque handle. C callers receive a pointer to this and pass it back into
/// every FFI function.
pub struct FfiClient {
    pub(crate) builder: RequestBuilder,
    pub(crate) tenant_slug: Option<String>,
    pub(crate) normalizer: Normalizer,
    pub(crate) reconciler: Reconciler,
}

/// Heap C string; interior NULs (never produced by serde_json) collapse to "".
pub(crate) fn c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[repr(C)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Patch => FfiHttpMethod::Patch,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `tb_build_request`. The host executes it with its own HTTP
/// stack and frees it with `tb_free_request`. `body` is null for requests
/// without a payload.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    pub(crate) fn from_core(req: tillbook_core::HttpRequest) -> *mut Self {
        let body = match req.body {
            Some(b) => c_string(b),
            None => std::ptr::null_mut(),
        };

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Vec<FfiHeader> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: c_string(k),
                    value: c_string(v),
                })
                .collect();
            // Exact capacity so `tb_free_request` can rebuild the Vec.
            Box::into_raw(ffi_headers.into_boxed_slice()) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url: c_string(req.url),
            headers,
            headers_len,
            body,
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// The host's HTTP response. The FFI layer reads but never frees it.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result type
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Unauthorized = 1,
    Validation = 2,
    NotFound = 3,
    Http = 4,
    MissingTenant = 5,
    InvalidInput = 6,
    Panic = 7,
    NullArg = 8,
}

/// Result envelope for every parse operation.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `json`
/// holds the payload. On failure `error_message` is set; for `Validation`
/// `json` holds the field errors map, otherwise it is null.
///
/// `session_cleared` is true after a 401. The host must then remove the
/// persisted token, user data and tenant, and route to sign-in.
#[repr(C)]
pub struct FfiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub session_cleared: bool,
    pub json: *mut c_char,
}

impl FfiResult {
    fn boxed(self) -> *mut Self {
        Box::into_raw(Box::new(self))
    }

    pub(crate) fn ok_json(json: String) -> *mut Self {
        FfiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 0,
            session_cleared: false,
            json: c_string(json),
        }
        .boxed()
    }

    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let error_code = match &err {
            ApiError::Unauthorized { .. } => FfiErrorCode::Unauthorized,
            ApiError::Validation { .. } => FfiErrorCode::Validation,
            ApiError::NotFound { .. } => FfiErrorCode::NotFound,
            ApiError::Http { .. } => FfiErrorCode::Http,
            ApiError::MissingTenant => FfiErrorCode::MissingTenant,
            _ => FfiErrorCode::InvalidInput,
        };
        let json = err
            .field_errors()
            .and_then(|errors| serde_json::to_string(errors).ok())
            .map_or(std::ptr::null_mut(), c_string);

        FfiResult {
            error_code,
            error_message: c_string(err.to_string()),
            http_status: err.status().unwrap_or(0),
            session_cleared: error_code == FfiErrorCode::Unauthorized,
            json,
        }
        .boxed()
    }

    pub(crate) fn invalid_input(msg: String) -> *mut Self {
        Self::failure(FfiErrorCode::InvalidInput, msg)
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, format!("null argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, msg.to_string())
    }

    fn failure(error_code: FfiErrorCode, msg: String) -> *mut Self {
        FfiResult {
            error_code,
            error_message: c_string(msg),
            http_status: 0,
            session_cleared: false,
            json: std::ptr::null_mut(),
        }
        .boxed()
    }
}
