pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{
    detection::ChangeDetector, models::ModelManager, utils::error::DetectionError, Config, Result,
};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ModelManager>,
    pub detector: Arc<ChangeDetector>,
    pub config: Config,
}

impl AppState {
    pub fn new(manager: ModelManager) -> Self {
        let config = manager.config().clone();
        let detector = Arc::new(ChangeDetector::new(manager.classifier(), config.max_image_bytes));

        Self {
            manager: Arc::new(manager),
            detector,
            config,
        }
    }
}

/// 启动HTTP服务；模型必须已在调用前加载完成
pub async fn serve(manager: ModelManager) -> Result<()> {
    let state = AppState::new(manager);
    let bind_addr = state.config.bind_addr.clone();

    let app = create_app(state);

    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| DetectionError::Config(format!("Invalid bind address {}: {}", bind_addr, e)))?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST {}      - Multipart upload (before, after)", handlers::DETECTION_ENDPOINT);
    tracing::info!("  POST {}/json - JSON base64 upload", handlers::DETECTION_ENDPOINT);
    tracing::info!("  GET  /                           - Service status");
    tracing::info!("  GET  /health                     - Health check");
    tracing::info!("  GET  /api/info                   - Service information");

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DetectionError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| DetectionError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let max_request_size = state.config.server_config.max_request_size;
    let request_timeout = state.config.server_config.request_timeout;

    Router::new()
        // 检测API路由
        .route(handlers::DETECTION_ENDPOINT, post(handlers::detection_upload_handler))
        .route("/deforestationdetection/json", post(handlers::detection_json_handler))
        // 系统路由
        .route("/", get(handlers::root_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        // 请求体大小由RequestBodyLimitLayer统一限制
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(request_timeout)))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .with_state(state)
}

/// 健康检查端点
async fn health_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let manager = Arc::clone(&state.manager);
    tokio::task::spawn_blocking(move || manager.health_check())
        .await
        .map_err(|e| DetectionError::Internal(format!("Health check task failed: {}", e)))??;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// 服务信息端点
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.manager.get_stats();

    Json(json!({
        "service": "EcoSense Deforestation Detection Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": stats,
        "limits": {
            "max_image_bytes": state.config.max_image_bytes,
            "max_request_size": state.config.server_config.max_request_size,
            "request_timeout_secs": state.config.server_config.request_timeout,
        }
    }))
}
