use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::{HealthResponse, RootResponse};

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let api = state.settings().api();
    Json(RootResponse {
        message: api.project_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs_url: format!("{}/docs", api.api_v1_str),
    })
}

/// Database failures make the service unhealthy; a broken Redis only degrades it.
pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.store().ping().await;
    let redis = state.redis().health().await;

    let status = match (&database, redis.is_degraded()) {
        (Err(_), _) => "unhealthy",
        (Ok(()), true) => "degraded",
        (Ok(()), false) => "healthy",
    };
    let database = database.map_or_else(|err| format!("unhealthy: {err}"), |()| "healthy".into());

    Json(HealthResponse {
        service: "homework-grading".to_string(),
        status: status.to_string(),
        components: HashMap::from([
            ("database".to_string(), database),
            ("redis".to_string(), redis.label()),
        ]),
    })
}

/// Only routed when the Prometheus exporter is enabled.
pub(crate) async fn metrics() -> Response {
    match metrics::render() {
        Some(body) => ([(CONTENT_TYPE, PROMETHEUS_TEXT)], body).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
