pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod ws;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::warn;

use legalmind_core::chat::ChatManager;
use legalmind_core::config::Config;

use crate::rate_limit::RateLimiter;

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub chat: Arc<ChatManager>,
    pub limiter: RateLimiter,
    pub trust_proxy: bool,
    /// Hide internal error detail from clients.
    pub production: bool,
    pub max_upload_bytes: usize,
    pub allowed_origins: Vec<String>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(chat: Arc<ChatManager>, config: &Config) -> Self {
        Self {
            chat,
            limiter: RateLimiter::per_minute(config.rate_limit_per_minute),
            trust_proxy: config.trust_proxy,
            production: config.is_production(),
            max_upload_bytes: usize::try_from(config.max_upload_mb.saturating_mul(1024 * 1024))
                .unwrap_or(usize::MAX),
            allowed_origins: config.allowed_origins.clone(),
            start_time: Instant::now(),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────────

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    // Chat and workflow turns cost model calls; they are the limited ones.
    let limited = Router::new()
        .route("/api/chat", post(routes::chat))
        .route("/api/workflow/run", post(routes::run_workflow))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit,
        ));

    let upload = Router::new()
        .route("/api/contracts/upload", post(routes::upload_contract))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_upload_bytes));

    Router::new()
        .route("/", get(routes::root))
        .route("/api/health", get(routes::health))
        // Sessions
        .route("/api/chat/session", post(routes::create_session))
        .route(
            "/api/chat/session/:id",
            get(routes::get_session).delete(routes::close_session),
        )
        .route("/api/chat/sessions", get(routes::list_sessions))
        // Contracts
        .route("/api/contracts", get(routes::list_contracts))
        .route(
            "/api/contracts/:id",
            get(routes::get_contract).delete(routes::delete_contract),
        )
        .route("/api/contracts/:id/download", get(routes::download_contract))
        .route("/api/contracts/:id/clauses", get(routes::contract_clauses))
        // Workflows and agents
        .route("/api/workflow/templates", get(routes::workflow_templates))
        .route("/api/agents", get(routes::list_agents))
        .route("/api/agents/:id", get(routes::get_agent))
        .route("/api/thinking-logs/:session_id", get(routes::thinking_logs))
        // Documents
        .route("/api/documents", get(routes::list_documents))
        .route("/api/documents/:id/download", get(routes::download_document))
        // Analysis
        .route("/api/compliance/frameworks", get(routes::compliance_frameworks))
        .route("/api/compliance/check/:contract_id", get(routes::check_compliance))
        .route("/api/risk/assess/:contract_id", get(routes::assess_risk))
        // WebSockets
        .route("/ws/chat", get(ws::chat_socket))
        .route("/ws/workflow", get(ws::workflow_socket))
        .merge(limited)
        .merge(upload)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::hide_internal_detail,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.allowed_origins)),
        )
        .with_state(state)
}
