use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN},
    http::{Method, Request, Response},
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    normalize_path::NormalizePathLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::api::handlers;
use crate::api::homework;
use crate::api::students;
use crate::core::{config::Settings, state::AppState};

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

fn request_id_header() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

pub(crate) fn router(state: AppState) -> Router {
    let settings = state.settings();
    let api_v1 = Router::new()
        .nest("/homework", homework::router())
        .nest("/students", students::router())
        .layer(DefaultBodyLimit::max(
            settings.intake().max_request_body_mb.saturating_mul(1024 * 1024),
        ));

    let mut app: Router<AppState> = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz).head(handlers::healthz))
        .nest(&settings.api().api_v1_str, api_v1);
    if settings.telemetry().prometheus_enabled {
        app = app.route("/metrics", get(handlers::metrics));
    }

    app.layer(NormalizePathLayer::trim_trailing_slash())
        .layer(PropagateRequestIdLayer::new(request_id_header()))
        .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(request_span).on_response(record_response))
        .layer(cors_layer(settings))
        .with_state(state)
}

fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(request_id_header())
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id
    )
}

fn record_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    let status = response.status().as_u16().to_string();
    metrics::histogram!("http_request_duration_seconds", "status" => status.clone())
        .record(latency.as_secs_f64());
    metrics::counter!("http_requests_total", "status" => status).increment(1);
}

/// The API carries no credentials, so browsers get plain cross-origin access only.
fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors()
        .origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let allow_origin =
        if origins.is_empty() { AllowOrigin::from(Any) } else { AllowOrigin::list(origins) };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, ORIGIN, request_id_header()])
        .expose_headers([request_id_header()])
        .max_age(PREFLIGHT_MAX_AGE)
}

#[cfg(test)]
mod tests {
    use axum::http::header::{
        ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
    };
    use axum::{body::Body, http::Method, http::Request, http::StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::core::metrics;
    use crate::test_support::{self, png_base64, MemoryStore, ScriptedGateway};

    #[tokio::test]
    async fn root_returns_message() {
        let ctx = test_support::setup_test_context(MemoryStore::new(), ScriptedGateway::default(), || {})
            .await;

        let response = ctx
            .app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = test_support::read_json(response).await;
        assert_eq!(json["message"], "Homework Grading API");
        assert_eq!(json["docs_url"], "/api/v1/docs");
    }

    #[tokio::test]
    async fn healthz_reports_components() {
        let ctx = test_support::setup_test_context(MemoryStore::new(), ScriptedGateway::default(), || {})
            .await;

        let response = ctx
            .app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = test_support::read_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["components"]["database"], "healthy");
        assert_eq!(json["components"]["redis"], "disconnected");
    }

    #[tokio::test]
    async fn metrics_disabled_returns_404() {
        let ctx = test_support::setup_test_context(MemoryStore::new(), ScriptedGateway::default(), || {})
            .await;

        let response = ctx
            .app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_enabled_returns_200() {
        let ctx = test_support::setup_test_context(MemoryStore::new(), ScriptedGateway::default(), || {
            std::env::set_var("PROMETHEUS_ENABLED", "1")
        })
        .await;
        metrics::init(ctx.state.settings()).expect("metrics init");

        let response = ctx
            .app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let ctx = test_support::setup_test_context(MemoryStore::new(), ScriptedGateway::default(), || {
            std::env::set_var("MAX_REQUEST_BODY_MB", "1")
        })
        .await;
        let images = vec![png_base64().repeat(40_000); 4];

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/homework/grade",
                Some(json!({ "studentId": "7", "images": images })),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ctx.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn preflight_allows_listed_origin_without_credentials() {
        let ctx = test_support::setup_test_context(MemoryStore::new(), ScriptedGateway::default(), || {
            std::env::set_var("BACKEND_CORS_ORIGINS", "http://academy.example")
        })
        .await;

        let response = ctx
            .app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/v1/homework/grade")
                    .header(ORIGIN, "http://academy.example")
                    .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("response");

        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "http://academy.example");
        assert!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        let allowed = headers[ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap().to_ascii_lowercase();
        assert!(allowed.contains("content-type"));
        assert!(!allowed.contains("authorization"));
    }
}
