//! Trace HTTP Server
//!
//! 嵌入式 HTTP 服务，每个请求重新运行一次追踪。
//!
//! ## Endpoints
//!
//! - `GET /health`
//! - `GET /api/trace/{kind}` - kind: servlet, filter, listener, all
//! - `GET /api/stages`
//! - `GET /visualize?kind=...`

use std::net::SocketAddr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerSettings;
use crate::error::TraceError;
use crate::report;
use crate::stages;
use crate::tracer::{ScoringPolicy, TraceTarget};

pub mod visualize;

/// 处理器共享状态 (只读)
#[derive(Debug, Clone, Copy, Default)]
pub struct AppState {
    pub policy: ScoringPolicy,
}

/// Error body returned for rejected requests
#[derive(Debug)]
pub struct ApiError(TraceError);

impl From<TraceError> for ApiError {
    fn from(e: TraceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            TraceError::UnsupportedComponentKind(_) | TraceError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            TraceError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(status = status.as_u16(), error = %self.0, "request rejected");
        (status, Json(json!({ "status": "error", "message": self.0.to_string() }))).into_response()
    }
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/stages", get(stage_catalog))
        .route("/api/trace/{kind}", get(trace_component))
        .route("/visualize", get(visualize_page))
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({
        "service": "servlet-trace",
        "endpoints": ENDPOINT_PATHS,
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn stage_catalog() -> Json<Value> {
    Json(stages::catalog_json())
}

async fn trace_component(State(state): State<AppState>, Path(kind): Path<String>) -> Result<Json<Value>, ApiError> {
    let target: TraceTarget = kind.parse()?;
    let report = report::run(target, &state.policy);
    Ok(Json(report.to_json()))
}

#[derive(Debug, Deserialize)]
struct VisualizeParams {
    kind: Option<String>,
}

async fn visualize_page(
    State(state): State<AppState>,
    Query(params): Query<VisualizeParams>,
) -> Result<Html<String>, ApiError> {
    let target = match params.kind.as_deref() {
        Some(kind) => kind.parse()?,
        None => TraceTarget::All,
    };
    let report = report::run(target, &state.policy);
    Ok(Html(visualize::render_page(&report)))
}

/// Paths printed by the launcher banner and listed on `/`
pub const ENDPOINT_PATHS: &[&str] = &[
    "/health",
    "/api/stages",
    "/api/trace/servlet",
    "/api/trace/filter",
    "/api/trace/listener",
    "/api/trace/all",
    "/visualize",
];

/// 嵌入式服务启动器
#[derive(Debug, Clone)]
pub struct TraceServer {
    settings: ServerSettings,
    state: AppState,
}

impl TraceServer {
    pub fn new(settings: ServerSettings, policy: ScoringPolicy) -> Self {
        Self {
            settings,
            state: AppState { policy },
        }
    }

    pub fn http_url(&self) -> String {
        format!("http://{}:{}", self.settings.host, self.settings.port)
    }

    pub fn endpoint_urls(&self) -> Vec<String> {
        urls_for(&self.http_url())
    }

    pub fn app(&self) -> Router {
        let app = router(self.state).layer(TraceLayer::new_for_http());
        if self.settings.cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        } else {
            app
        }
    }

    /// 启动服务 (阻塞直到 Ctrl+C)
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind((self.settings.host.as_str(), self.settings.port)).await?;

        // --port 0 时以实际绑定的端口为准
        let addr = listener.local_addr()?;
        print_banner(&bound_urls(addr));
        info!(%addr, "trace server listening");

        axum::serve(listener, self.app())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("trace server stopped");
        Ok(())
    }

}

fn urls_for(base: &str) -> Vec<String> {
    ENDPOINT_PATHS.iter().map(|p| format!("{base}{p}")).collect()
}

/// Endpoint URLs for an already bound listener address
pub fn bound_urls(addr: SocketAddr) -> Vec<String> {
    urls_for(&format!("http://{addr}"))
}

fn print_banner(urls: &[String]) {
    println!("========================================");
    println!("🛰️  Servlet Trace Server v{}", env!("CARGO_PKG_VERSION"));
    println!("----------------------------------------");
    for url in urls {
        println!("  {url}");
    }
    println!("----------------------------------------");
    println!("Press Ctrl+C to stop");
    println!("========================================");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        // 无法监听信号时保持运行
        std::future::pending::<()>().await;
    }
}
