//! Client core for the Tillbook business-accounting backend.
//!
//! # Overview
//! Builds authenticated REST requests, executes them through a pluggable
//! transport, and reconciles the backend's many list response shapes into
//! one canonical `NormalizedResult` with complete pagination metadata.
//!
//! # Design
//! - Host-does-IO split: `RequestBuilder` and `parse_response` are pure;
//!   `Transport` is the only seam that touches the network.
//! - Normalization and pagination reconciliation never fail. Unknown shapes
//!   degrade to an empty result so screens always have something to render.
//! - `ApiClient` owns the stateful parts: session token, tenant slug, the
//!   401 session wipe, and the primary/legacy search chain.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod fallback;
pub mod http;
pub mod normalize;
pub mod pagination;
pub mod params;
pub mod sequence;
pub mod services;
pub mod session;
pub mod transport;
pub mod types;

pub use client::{normalize_page, parse_body, parse_response, ApiClient, RequestBuilder, RequestOptions, Route};
pub use config::ClientConfig;
pub use error::ApiError;
pub use events::{Listeners, SessionEvent, Subscription};
pub use fallback::search_with_fallback;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use normalize::{normalize, Normalized, Normalizer, ResponseShape};
pub use pagination::{reconcile, Pagination, Reconciler};
pub use params::{clean, to_query_pairs, Params};
pub use sequence::{RequestSequencer, Ticket};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore};
pub use transport::{ReqwestTransport, Transport};
pub use types::{Customer, Envelope, ErrorBody, Expense, NormalizedResult, Product, Quotation, Supplier};
