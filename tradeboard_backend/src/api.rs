use crate::config::TradeboardConfig;
use crate::database::registry::TableKind;
use crate::database::store::{JsonRow, StoreError};
use crate::database::Database;
use crate::tables::{ListPage, TableService, DEFAULT_PAGE_LIMIT};
use crate::utils::now_millis;
use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

#[derive(Clone)]
pub struct AppState {
    pub config: TradeboardConfig,
    pub database: Database,
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { error: msg }),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { error: msg }),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse { error: msg })
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RowNotFound => ApiError::NotFound("Not found".into()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    success: bool,
    message: &'static str,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
}

/// Tries to bind to the given port, or finds the next available port.
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port + offset;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port + MAX_PORT_ATTEMPTS - 1
    )
}

pub fn build_router(state: AppState) -> Router {
    let public_dir = state.config.paths.public_dir.clone();
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/tables/:table", get(list_rows).post(create_row))
        .route(
            "/tables/:table/:id",
            get(get_row)
                .put(update_row)
                .patch(update_row)
                .delete(delete_row),
        )
        .fallback_service(ServeDir::new(public_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn serve_http(config: TradeboardConfig, database: Database) -> Result<()> {
    let state = AppState {
        config: config.clone(),
        database,
    };
    let router = build_router(state);

    let (listener, actual_port) = find_available_port(config.api_port).await?;
    if actual_port != config.api_port {
        tracing::warn!(
            requested_port = config.api_port,
            actual_port = actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    let addr = listener.local_addr()?;
    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now_millis(),
    })
}

fn resolve_table(segment: &str) -> Result<TableKind, ApiError> {
    TableKind::from_path(segment).ok_or_else(|| ApiError::NotFound("Not found".into()))
}

fn body_object(body: Value) -> Result<JsonRow, ApiError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::BadRequest("request body must be a JSON object".into())),
    }
}

async fn list_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<ListPage> {
    let kind = resolve_table(&table)?;
    let service = TableService::new(state.database.clone());
    let page = service.list(
        kind,
        params.page.unwrap_or(1),
        params.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        params.search,
    )?;
    Ok(Json(page))
}

async fn get_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let kind = resolve_table(&table)?;
    let service = TableService::new(state.database.clone());
    match service.get(kind, &Value::String(id))? {
        Some(row) => Ok(Json(row)),
        None => Err(ApiError::NotFound("Not found".into())),
    }
}

async fn create_row(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let kind = resolve_table(&table)?;
    let body = body_object(body)?;
    let service = TableService::new(state.database.clone());
    let row = service.create(kind, body)?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let kind = resolve_table(&table)?;
    let body = body_object(body)?;
    let service = TableService::new(state.database.clone());
    let row = service.update(kind, &Value::String(id), body)?;
    Ok(Json(row))
}

async fn delete_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult<DeleteResponse> {
    let kind = resolve_table(&table)?;
    let service = TableService::new(state.database.clone());
    service.delete(kind, &Value::String(id))?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "Deleted successfully",
    }))
}
