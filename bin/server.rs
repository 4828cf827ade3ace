// Shopstock - REST API server
// Thin HTTP surface over the core library; no ledger logic lives here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use shopstock::{
    bom, catalog, costing, db, ledger, workorder, MoveReason, ReceiveRequest, StockError,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            error: None,
        })
    }
}

/// StockError with an HTTP status mapping
struct ApiError(StockError);

impl From<StockError> for ApiError {
    fn from(e: StockError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StockError::Validation(_) => StatusCode::BAD_REQUEST,
            StockError::NotFound { .. } => StatusCode::NOT_FOUND,
            StockError::Duplicate { .. } | StockError::InvalidState(_) => StatusCode::CONFLICT,
            StockError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ApiResponse {
            success: false,
            data: (),
            error: Some(self.0.to_string()),
        });
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Deserialize)]
struct CreateTypeBody {
    code: String,
    name: String,
}

#[derive(Deserialize)]
struct CreateItemBody {
    name: String,
    type_code: String,
    unit: Option<String>,
}

#[derive(Deserialize)]
struct ReceiveBody {
    sku: String,
    qty: f64,
    unit_cost: f64,
    supplier: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct MoveBody {
    sku: String,
    qty: f64,
    reason: String,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

#[derive(Deserialize)]
struct CreateProductBody {
    name: String,
}

#[derive(Deserialize)]
struct BomLineBody {
    sku: String,
    qty_per: f64,
}

#[derive(Deserialize)]
struct CreateWorkOrderBody {
    product_code: String,
    quantity: f64,
    planned_at: Option<DateTime<Utc>>,
}

// ============================================================================
// API handlers
// ============================================================================

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

/// GET /api/health
async fn health_check() -> Json<ApiResponse<Health>> {
    ApiResponse::ok(Health {
        status: "OK",
        version: shopstock::VERSION,
    })
}

/// GET /api/types
async fn get_types(State(state): State<AppState>) -> ApiResult<Vec<catalog::ItemType>> {
    let conn = state.db.lock().unwrap();
    Ok(ApiResponse::ok(catalog::list_item_types(&conn)?))
}

/// POST /api/types
async fn post_type(
    State(state): State<AppState>,
    Json(body): Json<CreateTypeBody>,
) -> ApiResult<catalog::ItemType> {
    let conn = state.db.lock().unwrap();
    Ok(ApiResponse::ok(catalog::create_item_type(
        &conn, &body.code, &body.name,
    )?))
}

/// GET /api/items
async fn get_items(State(state): State<AppState>) -> ApiResult<Vec<catalog::ItemView>> {
    let conn = state.db.lock().unwrap();
    Ok(ApiResponse::ok(catalog::list_items(&conn)?))
}

/// POST /api/items
async fn post_item(
    State(state): State<AppState>,
    Json(body): Json<CreateItemBody>,
) -> ApiResult<catalog::Item> {
    let conn = state.db.lock().unwrap();
    Ok(ApiResponse::ok(catalog::create_item(
        &conn,
        &body.name,
        &body.type_code,
        body.unit.as_deref(),
    )?))
}

/// POST /api/receive - batch + RECEIVE move + moving-average update
async fn post_receive(
    State(state): State<AppState>,
    Json(body): Json<ReceiveBody>,
) -> ApiResult<costing::Receipt> {
    let mut conn = state.db.lock().unwrap();
    let receipt = costing::receive(
        &mut conn,
        ReceiveRequest {
            sku: &body.sku,
            qty: body.qty,
            unit_cost: body.unit_cost,
            supplier: body.supplier.as_deref(),
            expires_at: body.expires_at,
        },
    )?;
    Ok(ApiResponse::ok(receipt))
}

/// POST /api/move - manual issue/adjust
async fn post_move(
    State(state): State<AppState>,
    Json(body): Json<MoveBody>,
) -> ApiResult<ledger::StockMove> {
    let reason: MoveReason = body.reason.parse()?;
    let conn = state.db.lock().unwrap();
    let mv = ledger::record_move(&conn, &body.sku, body.qty, reason, body.reference.as_deref())?;
    Ok(ApiResponse::ok(mv))
}

/// GET /api/stock - derived per-item stock listing
async fn get_stock(State(state): State<AppState>) -> ApiResult<Vec<ledger::StockRow>> {
    let conn = state.db.lock().unwrap();
    Ok(ApiResponse::ok(ledger::list_stock(&conn)?))
}

/// GET /api/products
async fn get_products(State(state): State<AppState>) -> ApiResult<Vec<bom::Product>> {
    let conn = state.db.lock().unwrap();
    Ok(ApiResponse::ok(bom::list_products(&conn)?))
}

/// POST /api/products
async fn post_product(
    State(state): State<AppState>,
    Json(body): Json<CreateProductBody>,
) -> ApiResult<String> {
    let conn = state.db.lock().unwrap();
    Ok(ApiResponse::ok(bom::create_product(&conn, &body.name)?))
}

/// GET /api/products/:code/bom
async fn get_bom(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Vec<bom::BomLineView>> {
    let conn = state.db.lock().unwrap();
    Ok(ApiResponse::ok(bom::list_bom(&conn, &code)?))
}

/// POST /api/products/:code/bom
async fn post_bom(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<BomLineBody>,
) -> ApiResult<()> {
    let conn = state.db.lock().unwrap();
    bom::add_bom_line(&conn, &code, &body.sku, body.qty_per)?;
    Ok(ApiResponse::ok(()))
}

/// GET /api/workorders
async fn get_workorders(State(state): State<AppState>) -> ApiResult<Vec<workorder::WorkOrder>> {
    let conn = state.db.lock().unwrap();
    Ok(ApiResponse::ok(workorder::list_work_orders(&conn)?))
}

/// POST /api/workorders
async fn post_workorder(
    State(state): State<AppState>,
    Json(body): Json<CreateWorkOrderBody>,
) -> ApiResult<workorder::WorkOrder> {
    let conn = state.db.lock().unwrap();
    Ok(ApiResponse::ok(workorder::create_work_order(
        &conn,
        &body.product_code,
        body.quantity,
        body.planned_at,
    )?))
}

/// POST /api/workorders/:code/complete - consume components per BOM
async fn post_complete(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<DateTime<Utc>> {
    let mut conn = state.db.lock().unwrap();
    let completed_at = workorder::complete_work_order(&mut conn, &code)?;
    Ok(ApiResponse::ok(completed_at))
}

// ============================================================================
// Main server
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let db_path = std::env::var("SHOPSTOCK_DB").unwrap_or_else(|_| "shopstock.db".to_string());
    let mut conn = db::open(std::path::Path::new(&db_path)).expect("failed to open database");
    db::seed_demo(&mut conn).expect("failed to seed database");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/types", get(get_types).post(post_type))
        .route("/items", get(get_items).post(post_item))
        .route("/receive", post(post_receive))
        .route("/move", post(post_move))
        .route("/stock", get(get_stock))
        .route("/products", get(get_products).post(post_product))
        .route("/products/:code/bom", get(get_bom).post(post_bom))
        .route("/workorders", get(get_workorders).post(post_workorder))
        .route("/workorders/:code/complete", post(post_complete))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");

    tracing::info!(%addr, db = %db_path, "shopstock server listening");

    axum::serve(listener, app)
        .await
        .expect("server error");
}
