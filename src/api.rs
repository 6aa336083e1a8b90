//! HTTP service for NamiChain
//!
//! Exposes the ledger's get/set/check operations and the mining
//! template/submit contract as JSON endpoints. Every response carries a
//! `result` field; failures use `"error"` with an `err_msg` and an
//! `err_kind`, including malformed query or form input.

use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::{Block, KeyStatus};
use crate::client::ErrorKind;
use crate::codec::from_hex;
use crate::error::ChainError;
use crate::node::{ChainSummary, Node};
use crate::transaction::Transaction;

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Chain(e) => {
                let status = match &e {
                    ChainError::KeyNotFound(_) | ChainError::BlockNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    ChainError::ValueTooLong { .. }
                    | ChainError::InvalidBlock(_)
                    | ChainError::Codec(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, ErrorResponse::from(&e))
            }
            ApiError::InvalidInput(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(ErrorKind::InvalidInput, msg),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Chain(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub result: String,
    pub err_msg: String,
    pub err_kind: ErrorKind,
    /// Payload of the error (block rejection reason, missing key, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Offending field and its byte length for `value_too_long`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
}

impl ErrorResponse {
    fn new(kind: ErrorKind, err_msg: String) -> Self {
        ErrorResponse {
            result: "error".to_string(),
            err_msg,
            err_kind: kind,
            detail: None,
            field: None,
            len: None,
        }
    }
}

impl From<&ChainError> for ErrorResponse {
    fn from(err: &ChainError) -> Self {
        let msg = err.to_string();
        match err {
            ChainError::ValueTooLong { field, len } => ErrorResponse {
                field: Some(field.to_string()),
                len: Some(*len),
                ..ErrorResponse::new(ErrorKind::ValueTooLong, msg)
            },
            ChainError::InvalidBlock(reason) => ErrorResponse {
                detail: Some(reason.clone()),
                ..ErrorResponse::new(ErrorKind::InvalidBlock, msg)
            },
            ChainError::Codec(_) => ErrorResponse {
                detail: Some(msg.clone()),
                ..ErrorResponse::new(ErrorKind::InvalidBlock, msg)
            },
            ChainError::KeyNotFound(key) => ErrorResponse {
                detail: Some(key.clone()),
                ..ErrorResponse::new(ErrorKind::KeyNotFound, msg)
            },
            ChainError::BlockNotFound(id) => ErrorResponse {
                detail: Some(id.clone()),
                ..ErrorResponse::new(ErrorKind::BlockNotFound, msg)
            },
            _ => ErrorResponse::new(ErrorKind::Internal, msg),
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SetRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SubmitBlockRequest {
    /// Hex-encoded block.
    pub block: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub result: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValueResponse {
    pub result: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TemplateResponse {
    pub result: String,
    /// Hex-encoded template block.
    pub template: String,
    /// Hex-encoded target in comparison (big-endian) order.
    pub target: String,
}

#[derive(Debug, Serialize)]
pub struct BlockView {
    pub hash: String,
    pub size: usize,
    pub timestamp: u32,
    pub prev_hash: String,
    pub target: String,
    pub tx_hash: String,
    pub nonce: u32,
    pub tx_count: u32,
    pub transactions: Vec<Transaction>,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        BlockView {
            hash: block.hash_hex(),
            size: block.size(),
            timestamp: block.header.timestamp,
            prev_hash: hex::encode(block.header.prev_hash),
            target: hex::encode(block.header.target.as_le_bytes()),
            tx_hash: hex::encode(block.header.tx_hash),
            nonce: block.header.nonce,
            tx_count: block.tx_count(),
            transactions: block.transactions().to_vec(),
        }
    }
}

/// Wire name of a key's status. Missing keys report `"404"`.
pub fn status_label(status: KeyStatus) -> &'static str {
    match status {
        KeyStatus::Included => "included",
        KeyStatus::Queued => "queued",
        KeyStatus::NotFound => "404",
    }
}

fn ok() -> Json<OkResponse> {
    Json(OkResponse {
        result: "ok".to_string(),
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        // Ledger endpoints
        .route("/get", get(get_value))
        .route("/set", post(set_value))
        .route("/check", get(check_key))
        // Mining endpoints
        .route("/get_mining_template", get(get_mining_template))
        .route("/submit_block", post(submit_block))
        // Chain views
        .route("/", get(index))
        .route("/block/:id", get(get_block))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serves until `shutdown` resolves.
pub async fn run_api_server(
    node: Arc<Node>,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ChainError> {
    let app = build_api_router(node);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "api server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn get_value(
    State(node): State<Arc<Node>>,
    query: Result<Query<KeyQuery>, QueryRejection>,
) -> Result<Json<ValueResponse>, ApiError> {
    let Query(q) = query?;
    let value = node.get(&q.key).await?;
    Ok(Json(ValueResponse {
        result: "ok".to_string(),
        value,
    }))
}

async fn set_value(
    State(node): State<Arc<Node>>,
    form: Result<Form<SetRequest>, FormRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Form(req) = form?;
    node.set(&req.key, &req.value).await?;
    Ok(ok())
}

async fn check_key(
    State(node): State<Arc<Node>>,
    query: Result<Query<KeyQuery>, QueryRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Query(q) = query?;
    let status = node.check(&q.key).await;
    Ok(Json(OkResponse {
        result: status_label(status).to_string(),
    }))
}

async fn get_mining_template(State(node): State<Arc<Node>>) -> Json<TemplateResponse> {
    let template = node.mining_template().await;
    Json(TemplateResponse {
        result: "ok".to_string(),
        template: template.block.to_hex(),
        target: template.target.to_string(),
    })
}

async fn submit_block(
    State(node): State<Arc<Node>>,
    form: Result<Form<SubmitBlockRequest>, FormRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Form(req) = form?;
    let bytes = from_hex(&req.block).map_err(ChainError::from)?;
    node.submit_block(&bytes).await?;
    Ok(ok())
}

async fn index(State(node): State<Arc<Node>>) -> Json<ChainSummary> {
    Json(node.summary().await)
}

async fn get_block(
    State(node): State<Arc<Node>>,
    Path(id): Path<String>,
) -> Result<Json<BlockView>, ApiError> {
    let block = node.block(&id).await?;
    Ok(Json(BlockView::from(&block)))
}

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "height": node.height().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
