//! Typed service wrappers used by the app screens.
//!
//! Each service borrows an `ApiClient` and maps one backend resource onto
//! typed results. List calls go through `fetch_page`, so they always come
//! back normalized; search calls go through the primary/legacy chain.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::{ApiClient, RequestOptions, Route};
use crate::error::{ApiError, Result};
use crate::http::HttpMethod;
use crate::normalize::extract_record;
use crate::params::Params;
use crate::session::SessionStore;
use crate::transport::Transport;
use crate::types::{Customer, Expense, NormalizedResult, Product, Quotation, Supplier};

const SEARCH_PAGE_SIZE: u64 = 20;

/// Filters shared by the list screens.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListFilters {
    pub search: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Filters for the report screens.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportFilters {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub branch_id: Option<u64>,
    pub group_by: Option<String>,
    pub compare: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

fn to_params<F: Serialize>(filters: &F) -> Params {
    serde_json::to_value(filters)
        .map(Params::from_value)
        .unwrap_or_default()
}

impl ListFilters {
    pub fn to_params(&self) -> Params {
        to_params(self)
    }
}

impl ReportFilters {
    pub fn to_params(&self) -> Params {
        to_params(self)
    }
}

fn decode_record<R: DeserializeOwned>(raw: Value) -> Result<R> {
    let record = extract_record(&raw)
        .cloned()
        .ok_or_else(|| ApiError::Deserialization("response carries no record".to_string()))?;
    serde_json::from_value(record).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Search params for the current endpoint and the adapted legacy params.
fn search_routes(resource: &str, term: &str, page: u64) -> (Route, Route) {
    let primary = Route::tenant(
        format!("{resource}/search"),
        Params::new()
            .with("q", term)
            .with("page", page)
            .with("per_page", SEARCH_PAGE_SIZE),
    );
    let legacy = Route::tenant(
        resource,
        Params::new()
            .with("search", term)
            .with("page", page)
            .with("per_page", SEARCH_PAGE_SIZE),
    );
    (primary, legacy)
}

pub struct CustomerService<'a, T, S> {
    client: &'a ApiClient<T, S>,
}

impl<'a, T: Transport, S: SessionStore> CustomerService<'a, T, S> {
    pub fn new(client: &'a ApiClient<T, S>) -> Self {
        Self { client }
    }

    pub async fn search(&self, term: &str, page: u64) -> Result<NormalizedResult<Customer>> {
        let (primary, legacy) = search_routes("customers", term.trim(), page.max(1));
        Ok(self.client.search_with_fallback(&primary, &legacy).await?.into_typed())
    }

    pub async fn list(&self, filters: &ListFilters) -> Result<NormalizedResult<Customer>> {
        let route = Route::tenant("customers", filters.to_params());
        Ok(self.client.fetch_page(&route).await?.into_typed())
    }

    pub async fn create<B: Serialize>(&self, payload: &B) -> Result<Customer> {
        decode_record(self.client.tenant_post("customers", payload).await?)
    }
}

pub struct SupplierService<'a, T, S> {
    client: &'a ApiClient<T, S>,
}

impl<'a, T: Transport, S: SessionStore> SupplierService<'a, T, S> {
    pub fn new(client: &'a ApiClient<T, S>) -> Self {
        Self { client }
    }

    pub async fn search(&self, term: &str, page: u64) -> Result<NormalizedResult<Supplier>> {
        let (primary, legacy) = search_routes("suppliers", term.trim(), page.max(1));
        Ok(self.client.search_with_fallback(&primary, &legacy).await?.into_typed())
    }
}

pub struct ProductService<'a, T, S> {
    client: &'a ApiClient<T, S>,
}

impl<'a, T: Transport, S: SessionStore> ProductService<'a, T, S> {
    pub fn new(client: &'a ApiClient<T, S>) -> Self {
        Self { client }
    }

    pub async fn list(&self, filters: &ListFilters) -> Result<NormalizedResult<Product>> {
        let route = Route::tenant("products", filters.to_params());
        Ok(self.client.fetch_page(&route).await?.into_typed())
    }
}

pub struct QuotationService<'a, T, S> {
    client: &'a ApiClient<T, S>,
}

impl<'a, T: Transport, S: SessionStore> QuotationService<'a, T, S> {
    pub fn new(client: &'a ApiClient<T, S>) -> Self {
        Self { client }
    }

    pub async fn list(&self, filters: &ListFilters) -> Result<NormalizedResult<Quotation>> {
        let route = Route::tenant("quotations", filters.to_params());
        Ok(self.client.fetch_page(&route).await?.into_typed())
    }

    pub async fn get(&self, id: u64) -> Result<Quotation> {
        let raw = self
            .client
            .tenant_get(&format!("quotations/{id}"), Params::new())
            .await?;
        decode_record(raw)
    }

    /// Convert an accepted quotation into an invoice; returns the invoice.
    pub async fn convert_to_invoice(&self, id: u64) -> Result<Value> {
        let raw = self
            .client
            .request(
                HttpMethod::Post,
                &format!("quotations/{id}/convert"),
                &RequestOptions::tenant(),
            )
            .await?;
        Ok(extract_record(&raw).cloned().unwrap_or(raw))
    }
}

pub struct ExpenseService<'a, T, S> {
    client: &'a ApiClient<T, S>,
}

impl<'a, T: Transport, S: SessionStore> ExpenseService<'a, T, S> {
    pub fn new(client: &'a ApiClient<T, S>) -> Self {
        Self { client }
    }

    pub async fn list(&self, filters: &ListFilters) -> Result<NormalizedResult<Expense>> {
        let route = Route::tenant("expenses", filters.to_params());
        Ok(self.client.fetch_page(&route).await?.into_typed())
    }
}

/// Report rows stay dynamic; their columns vary per report.
pub struct ReportService<'a, T, S> {
    client: &'a ApiClient<T, S>,
}

impl<'a, T: Transport, S: SessionStore> ReportService<'a, T, S> {
    pub fn new(client: &'a ApiClient<T, S>) -> Self {
        Self { client }
    }

    async fn report(&self, name: &str, filters: &ReportFilters) -> Result<NormalizedResult> {
        let route = Route::tenant(format!("reports/{name}"), filters.to_params());
        self.client.fetch_page(&route).await
    }

    pub async fn sales(&self, filters: &ReportFilters) -> Result<NormalizedResult> {
        self.report("sales", filters).await
    }

    pub async fn expenses(&self, filters: &ReportFilters) -> Result<NormalizedResult> {
        self.report("expenses", filters).await
    }

    pub async fn profit_and_loss(&self, filters: &ReportFilters) -> Result<NormalizedResult> {
        self.report("profit-loss", filters).await
    }
}
