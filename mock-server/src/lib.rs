//! In-memory stand-in for the Tillbook backend.
//!
//! Serves every list convention the client has to cope with: Laravel-style
//! paginators nested in an envelope, legacy lists keyed by resource name,
//! bare arrays, `meta` blocks, and report payloads with summaries. With
//! `legacy_only` set, the current-version search endpoints answer 404, the
//! way an older deployment does.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const VALID_TOKEN: &str = "test-token";
pub const TENANT: &str = "acme";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Supplier {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub sku: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quotation {
    pub id: u64,
    pub quotation_number: String,
    pub status: String,
    pub total: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expense {
    pub id: u64,
    pub description: String,
    pub category: String,
    pub amount: f64,
    pub date: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sale {
    pub id: u64,
    pub date: String,
    pub total: f64,
}

#[derive(Deserialize)]
pub struct CreateCustomer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Backend {
    pub customers: Vec<Customer>,
    pub suppliers: Vec<Supplier>,
    pub products: Vec<Product>,
    pub quotations: Vec<Quotation>,
    pub expenses: Vec<Expense>,
    pub sales: Vec<Sale>,
    pub next_invoice: u64,
    pub legacy_only: bool,
}

impl Backend {
    /// A small tenant with enough quotations to span several pages.
    pub fn seeded() -> Self {
        let customers = ["Acme Trading", "Bluebird Cafe", "Acorn Hardware", "Delta Freight"]
            .iter()
            .enumerate()
            .map(|(i, name)| Customer {
                id: i as u64 + 1,
                name: name.to_string(),
                email: None,
            })
            .collect();
        let suppliers = vec![
            Supplier { id: 1, name: "Initech Supplies".to_string() },
            Supplier { id: 2, name: "Globex Wholesale".to_string() },
        ];
        let products = vec![
            Product { id: 1, name: "Espresso beans 1kg".to_string(), sku: "COF-001".to_string() },
            Product { id: 2, name: "Paper cups 12oz".to_string(), sku: "CUP-012".to_string() },
        ];
        let quotations = (1..=25)
            .map(|id| Quotation {
                id,
                quotation_number: format!("QT-{id:04}"),
                status: (if id % 3 == 0 { "accepted" } else { "draft" }).to_string(),
                total: id as f64 * 100.0,
            })
            .collect();
        let expenses = vec![
            Expense {
                id: 1,
                description: "Fuel".to_string(),
                category: "transport".to_string(),
                amount: 40.0,
                date: "2024-05-02".to_string(),
            },
            Expense {
                id: 2,
                description: "Rent".to_string(),
                category: "premises".to_string(),
                amount: 900.0,
                date: "2024-05-01".to_string(),
            },
        ];
        let sales = vec![
            Sale { id: 1, date: "2024-04-30".to_string(), total: 75.0 },
            Sale { id: 2, date: "2024-05-01".to_string(), total: 150.0 },
            Sale { id: 3, date: "2024-05-15".to_string(), total: 220.5 },
        ];
        Self {
            customers,
            suppliers,
            products,
            quotations,
            expenses,
            sales,
            next_invoice: 1,
            legacy_only: false,
        }
    }

    pub fn legacy_only(mut self) -> Self {
        self.legacy_only = true;
        self
    }
}

pub type Db = Arc<RwLock<Backend>>;

type Reply = Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)>;

pub fn app() -> Router {
    app_with(Backend::seeded())
}

pub fn app_with(backend: Backend) -> Router {
    let db: Db = Arc::new(RwLock::new(backend));
    let tenant = Router::new()
        .route("/customers", get(list_customers_legacy).post(create_customer))
        .route("/customers/search", get(search_customers))
        .route("/suppliers", get(list_suppliers_legacy))
        .route("/suppliers/search", get(search_suppliers))
        .route("/products", get(list_products))
        .route("/quotations", get(list_quotations))
        .route("/quotations/{id}", get(get_quotation))
        .route("/quotations/{id}/convert", post(convert_quotation))
        .route("/expenses", get(list_expenses))
        .route("/reports/sales", get(sales_report))
        .route("/reports/expenses", get(expense_report))
        .route("/reports/profit-loss", get(profit_and_loss));
    Router::new()
        .route("/api/v1/auth/me", get(me))
        .nest("/api/v1/tenant/{slug}", tenant)
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, backend: Backend) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(backend)).await
}

fn failure(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"success": false, "message": message})))
}

fn ok(body: Value) -> Reply {
    Ok((StatusCode::OK, Json(body)))
}

fn authorize(headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    let expected = format!("Bearer {VALID_TOKEN}");
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(failure(StatusCode::UNAUTHORIZED, "Unauthenticated.")),
    }
}

fn tenant_request(headers: &HeaderMap, slug: &str) -> Result<(), (StatusCode, Json<Value>)> {
    authorize(headers)?;
    if slug != TENANT {
        return Err(failure(StatusCode::NOT_FOUND, "Tenant not found."));
    }
    Ok(())
}

fn number(query: &HashMap<String, String>, key: &str) -> Option<usize> {
    query.get(key).and_then(|v| v.parse().ok())
}

fn matches_term(name: &str, term: Option<&String>) -> bool {
    match term.map(|t| t.trim().to_lowercase()) {
        Some(t) if !t.is_empty() => name.to_lowercase().contains(&t),
        _ => true,
    }
}

/// Laravel paginator body for `items`.
fn paginate<T: Serialize>(items: &[T], query: &HashMap<String, String>) -> Value {
    let per_page = number(query, "per_page").filter(|n| *n > 0).unwrap_or(15);
    let page = number(query, "page").filter(|n| *n > 0).unwrap_or(1);
    let total = items.len();
    let start = (page - 1).saturating_mul(per_page).min(total);
    let end = start.saturating_add(per_page).min(total);
    let slice = &items[start..end];
    let (from, to) = if slice.is_empty() {
        (Value::Null, Value::Null)
    } else {
        (json!(start + 1), json!(end))
    };
    json!({
        "data": slice,
        "current_page": page,
        "last_page": total.div_ceil(per_page).max(1),
        "per_page": per_page,
        "total": total,
        "from": from,
        "to": to,
    })
}

async fn me(headers: HeaderMap) -> Reply {
    authorize(&headers)?;
    ok(json!({"success": true, "data": {"id": 1, "name": "Owner", "tenant_slug": TENANT}}))
}

async fn search_customers(
    State(db): State<Db>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    tenant_request(&headers, &slug)?;
    let backend = db.read().await;
    if backend.legacy_only {
        return Err(failure(StatusCode::NOT_FOUND, "Route not found."));
    }
    let found: Vec<Customer> = backend
        .customers
        .iter()
        .filter(|c| matches_term(&c.name, query.get("q")))
        .cloned()
        .collect();
    ok(json!({"success": true, "data": paginate(&found, &query)}))
}

async fn list_customers_legacy(
    State(db): State<Db>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    tenant_request(&headers, &slug)?;
    let backend = db.read().await;
    let found: Vec<&Customer> = backend
        .customers
        .iter()
        .filter(|c| matches_term(&c.name, query.get("search")))
        .collect();
    ok(json!({"success": true, "data": {"customers": found}}))
}

async fn create_customer(
    State(db): State<Db>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(input): Json<CreateCustomer>,
) -> Reply {
    tenant_request(&headers, &slug)?;
    let Some(name) = input.name.filter(|n| !n.trim().is_empty()) else {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "The given data was invalid.",
                "errors": {"name": ["The name field is required."]}
            })),
        ));
    };
    let mut backend = db.write().await;
    let customer = Customer {
        id: backend.customers.iter().map(|c| c.id).max().unwrap_or(0) + 1,
        name,
        email: input.email,
    };
    backend.customers.push(customer.clone());
    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "message": "Customer created", "data": customer})),
    ))
}

async fn search_suppliers(
    State(db): State<Db>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    tenant_request(&headers, &slug)?;
    let backend = db.read().await;
    if backend.legacy_only {
        return Err(failure(StatusCode::NOT_FOUND, "Route not found."));
    }
    let found: Vec<Supplier> = backend
        .suppliers
        .iter()
        .filter(|s| matches_term(&s.name, query.get("q")))
        .cloned()
        .collect();
    let mut page = paginate(&found, &query);
    let records = page["data"].take();
    ok(json!({"data": records, "meta": page}))
}

async fn list_suppliers_legacy(
    State(db): State<Db>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    tenant_request(&headers, &slug)?;
    let backend = db.read().await;
    let found: Vec<&Supplier> = backend
        .suppliers
        .iter()
        .filter(|s| matches_term(&s.name, query.get("search")))
        .collect();
    ok(json!({"data": {"suppliers": found}}))
}

async fn list_products(State(db): State<Db>, Path(slug): Path<String>, headers: HeaderMap) -> Reply {
    tenant_request(&headers, &slug)?;
    let backend = db.read().await;
    ok(json!(backend.products))
}

async fn list_quotations(
    State(db): State<Db>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    tenant_request(&headers, &slug)?;
    let backend = db.read().await;
    let found: Vec<&Quotation> = backend
        .quotations
        .iter()
        .filter(|q| query.get("status").is_none_or(|s| &q.status == s))
        .collect();
    // Partial metadata: only the page number and total, like the v1 endpoint.
    let mut page = paginate(&found, &query);
    let body = json!({
        "data": page["data"].take(),
        "current_page": page["current_page"].take(),
        "total": page["total"].take(),
    });
    ok(json!({"success": true, "data": body}))
}

async fn get_quotation(
    State(db): State<Db>,
    Path((slug, id)): Path<(String, u64)>,
    headers: HeaderMap,
) -> Reply {
    tenant_request(&headers, &slug)?;
    let backend = db.read().await;
    match backend.quotations.iter().find(|q| q.id == id) {
        Some(quotation) => ok(json!({"success": true, "data": quotation})),
        None => Err(failure(StatusCode::NOT_FOUND, "Quotation not found.")),
    }
}

async fn convert_quotation(
    State(db): State<Db>,
    Path((slug, id)): Path<(String, u64)>,
    headers: HeaderMap,
) -> Reply {
    tenant_request(&headers, &slug)?;
    let mut backend = db.write().await;
    let Some(quotation) = backend.quotations.iter_mut().find(|q| q.id == id) else {
        return Err(failure(StatusCode::NOT_FOUND, "Quotation not found."));
    };
    quotation.status = "converted".to_string();
    let total = quotation.total;
    let invoice_id = backend.next_invoice;
    backend.next_invoice += 1;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Quotation converted",
            "data": {
                "id": invoice_id,
                "invoice_number": format!("INV-{invoice_id:04}"),
                "quotation_id": id,
                "total": total,
            }
        })),
    ))
}

async fn list_expenses(State(db): State<Db>, Path(slug): Path<String>, headers: HeaderMap) -> Reply {
    tenant_request(&headers, &slug)?;
    let backend = db.read().await;
    ok(json!({"success": true, "data": {"expenses": backend.expenses}}))
}

fn in_range(date: &str, query: &HashMap<String, String>) -> bool {
    let after_start = query.get("start_date").is_none_or(|s| date >= s.as_str());
    let before_end = query.get("end_date").is_none_or(|e| date <= e.as_str());
    after_start && before_end
}

async fn sales_report(
    State(db): State<Db>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    tenant_request(&headers, &slug)?;
    let backend = db.read().await;
    let rows: Vec<&Sale> = backend.sales.iter().filter(|s| in_range(&s.date, &query)).collect();
    let total: f64 = rows.iter().map(|s| s.total).sum();
    ok(json!({
        "success": true,
        "data": {
            "data": rows,
            "total": rows.len(),
            "summary": {"total_sales": total, "count": rows.len()}
        }
    }))
}

async fn expense_report(
    State(db): State<Db>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    tenant_request(&headers, &slug)?;
    let backend = db.read().await;
    let rows: Vec<&Expense> = backend
        .expenses
        .iter()
        .filter(|e| in_range(&e.date, &query))
        .collect();
    let total: f64 = rows.iter().map(|e| e.amount).sum();
    ok(json!({
        "success": true,
        "data": rows,
        "statistics": {"total_expenses": total}
    }))
}

async fn profit_and_loss(
    State(db): State<Db>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    tenant_request(&headers, &slug)?;
    let backend = db.read().await;
    let revenue: f64 = backend
        .sales
        .iter()
        .filter(|s| in_range(&s.date, &query))
        .map(|s| s.total)
        .sum();
    let expenses: f64 = backend
        .expenses
        .iter()
        .filter(|e| in_range(&e.date, &query))
        .map(|e| e.amount)
        .sum();
    ok(json!({
        "success": true,
        "data": {"summary": {"revenue": revenue, "expenses": expenses, "net": revenue - expenses}}
    }))
}
