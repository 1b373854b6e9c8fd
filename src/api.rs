//! REST API server for Davcoin
//!
//! Thin HTTP glue over [`Node`]: each route maps to one node operation and
//! serializes its result. Peers fetch each other's chains through
//! `GET /get_chain`.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::blockchain::{Block, ChainResponse};
use crate::error::ChainError;
use crate::node::{Node, NodeState};
use crate::transaction::TransactionRequest;

/// Shared state handed to every handler.
pub struct AppState {
    pub node: Arc<Node>,
    stats: RwLock<ApiStats>,
}

impl AppState {
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            stats: RwLock::new(ApiStats::new()),
        }
    }
}

/// API statistics and monitoring
#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    transactions_submitted: u64,
    consensus_runs: u64,
    chains_replaced: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(e) if e.is_client_error() => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::BlockchainError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    #[serde(flatten)]
    pub block: Block,
}

#[derive(Serialize)]
pub struct ValidityResponse {
    pub message: String,
    pub valid: bool,
}

#[derive(Serialize)]
pub struct TransactionAccepted {
    pub message: String,
    pub index: u64,
}

#[derive(Deserialize)]
pub struct ConnectRequest {
    #[serde(default)]
    pub nodes: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct ConnectResponse {
    pub message: String,
    pub total_nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub transactions_submitted: u64,
    pub consensus_runs: u64,
    pub chains_replaced: u64,
    pub blocks_mined: u64,
    pub chain_length: usize,
    pub peer_count: usize,
    pub uptime_seconds: u64,
}

// ============================================================================
// Middleware
// ============================================================================

/// Request statistics middleware
async fn stats_middleware(State(app): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    app.stats.write().await.record_request(success);

    response
}

/// Request logging middleware. Logs method, path, status, duration and the
/// current `NodeState`.
async fn logging_middleware(
    State(app): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();
    let node_state = app.node.state().await;

    info!(
        method = %method,
        path = %path,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        node_state = ?node_state,
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints.
pub fn build_api_router(node: Arc<Node>) -> Router {
    let app = Arc::new(AppState::new(node));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        // Ledger endpoints
        .route("/mine_block", get(mine_block))
        .route("/get_chain", get(get_chain))
        .route("/is_valid", get(is_valid))
        .route("/add_transaction", post(add_transaction))
        // Peer endpoints
        .route("/connect_node", post(connect_node))
        .route("/replace_chain", get(replace_chain))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // logging before stats so we always record timing and node-state
        .layer(middleware::from_fn_with_state(app.clone(), logging_middleware))
        .layer(middleware::from_fn_with_state(app.clone(), stats_middleware))
        .with_state(app)
        .layer(cors)
}

/// Serve the API on `addr` until the server stops.
pub async fn run_api_server(node: Arc<Node>, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(node);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn mine_block(State(app): State<Arc<AppState>>) -> Result<Json<MineResponse>, ApiError> {
    let block = app.node.mine().await?;
    Ok(Json(MineResponse {
        message: "Congratulations, you just mined a block!".to_string(),
        block,
    }))
}

async fn get_chain(State(app): State<Arc<AppState>>) -> Json<ChainResponse> {
    Json(app.node.chain().await)
}

async fn is_valid(State(app): State<Arc<AppState>>) -> Json<ValidityResponse> {
    let valid = app.node.is_valid().await;
    let message = if valid {
        "All good. The Blockchain is valid."
    } else {
        "Houston, we have a problem. The Blockchain is not valid."
    };
    Json(ValidityResponse {
        message: message.to_string(),
        valid,
    })
}

async fn add_transaction(
    State(app): State<Arc<AppState>>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionAccepted>), ApiError> {
    let Json(request) = payload?;
    let index = app.node.submit_transaction(request).await?;

    app.stats.write().await.transactions_submitted += 1;

    Ok((
        StatusCode::CREATED,
        Json(TransactionAccepted {
            message: format!("This transaction will be added to Block {}", index),
            index,
        }),
    ))
}

async fn connect_node(
    State(app): State<Arc<AppState>>,
    payload: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ConnectResponse>), ApiError> {
    let Json(request) = payload?;
    let nodes = request
        .nodes
        .ok_or_else(|| ApiError::InvalidInput("No node".to_string()))?;
    let total_nodes = app.node.register_peers(&nodes).await?;

    Ok((
        StatusCode::CREATED,
        Json(ConnectResponse {
            message: "All the nodes are now connected. The Davcoin Blockchain now contains the following nodes".to_string(),
            total_nodes,
        }),
    ))
}

async fn replace_chain(State(app): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let outcome = app.node.resolve_conflicts().await?;

    {
        let mut stats = app.stats.write().await;
        stats.consensus_runs += 1;
        if outcome.replaced {
            stats.chains_replaced += 1;
        }
    }

    let body = if outcome.replaced {
        serde_json::json!({
            "message": "The nodes had different chains so the chain was replaced by the longest one.",
            "replaced": true,
            "new_chain": outcome.chain,
        })
    } else {
        serde_json::json!({
            "message": "All good. The chain is the longest one.",
            "replaced": false,
            "actual_chain": outcome.chain,
        })
    };
    Ok(Json(body))
}

async fn health_check(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    let state = app.node.state().await;
    let (status, label) = match state {
        NodeState::Booting => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
        NodeState::Syncing | NodeState::Ready => (StatusCode::OK, "healthy"),
    };

    (
        status,
        Json(serde_json::json!({
            "status": label,
            "node_state": format!("{:?}", state),
            "node_address": app.node.node_address(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

async fn get_api_stats(State(app): State<Arc<AppState>>) -> Json<ApiStatsResponse> {
    let chain_length = app.node.chain_len().await;
    let peer_count = app.node.peers().await.len();
    let stats = app.stats.read().await;
    let uptime = stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);

    Json(ApiStatsResponse {
        total_requests: stats.total_requests,
        successful_requests: stats.successful_requests,
        failed_requests: stats.failed_requests,
        transactions_submitted: stats.transactions_submitted,
        consensus_runs: stats.consensus_runs,
        chains_replaced: stats.chains_replaced,
        blocks_mined: app.node.blocks_mined(),
        chain_length,
        peer_count,
        uptime_seconds: uptime,
    })
}
