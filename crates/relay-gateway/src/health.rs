use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use relay_engine::Dispatcher;

/// Parse the liveness port. Anything that is not a port number disables the endpoint.
pub fn parse_port(raw: Option<&str>) -> Option<u16> {
    raw.and_then(|p| p.trim().parse::<u16>().ok())
}

/// GET / — plain keep-alive ping for uptime monitors.
async fn ping() -> &'static str {
    "pong"
}

/// GET /health — liveness probe with relay metadata.
async fn health_handler(State(dispatcher): State<Arc<Dispatcher>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "redirects": dispatcher.rules().len(),
    }))
}

pub fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(ping))
        .route("/health", get(health_handler))
        .with_state(dispatcher)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
