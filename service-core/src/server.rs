//! HTTP scaffolding shared by every service binary.

use axum::{
    Json, Router,
    extract::{Request, State},
    handler::Handler,
    http::{Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{MethodRouter, get, post},
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::error::AppError;
use crate::middleware::{
    metrics_middleware, request_id_from, request_id_middleware, security_headers_middleware,
};
use crate::observability::render_metrics;
use crate::warehouse::SharedWarehouse;

/// Fallback for anything no route accepts: unknown POST paths are 404,
/// every other method is 405.
pub async fn unmatched_request(method: Method, uri: Uri) -> AppError {
    if method == Method::POST {
        AppError::NotFound(format!("Endpoint {} not found.", uri.path()))
    } else {
        AppError::MethodNotAllowed {
            method: method.to_string(),
            path: uri.path().to_string(),
        }
    }
}

/// A POST route whose other methods fall through to [`unmatched_request`].
pub fn post_only<H, T, S>(handler: H) -> MethodRouter<S>
where
    H: Handler<T, S>,
    T: 'static,
    S: Clone + Send + Sync + 'static,
{
    post(handler).fallback(unmatched_request)
}

#[derive(Clone)]
pub struct HealthState {
    pub service: &'static str,
    /// Display name used in the `GET /` banner. `None` leaves `/` to the service.
    pub banner: Option<&'static str>,
    pub warehouse: Option<SharedWarehouse>,
}

async fn banner(State(state): State<HealthState>) -> Response {
    let name = state.banner.unwrap_or(state.service);
    let Some(warehouse) = state.warehouse.as_ref() else {
        return (StatusCode::OK, format!("{} is running!", name)).into_response();
    };

    match warehouse.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            format!("{} is running and connected to BigQuery!", name),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed BigQuery query");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{} health check failed: {}", name, e),
            )
                .into_response()
        }
    }
}

/// Liveness probe. Does not touch the warehouse.
async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": state.service,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness probe.
async fn readiness_check(State(state): State<HealthState>) -> impl IntoResponse {
    let Some(warehouse) = state.warehouse.as_ref() else {
        return (StatusCode::OK, Json(json!({ "status": "ready" })));
    };

    match warehouse.health_check().await {
        Ok(()) => {
            tracing::debug!("Readiness check passed");
            (StatusCode::OK, Json(json!({ "status": "ready" })))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed - warehouse unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "service": state.service,
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        render_metrics(),
    )
}

/// Probe routes: `/health`, `/ready`, `/metrics`, plus the `GET /` banner when configured.
pub fn health_router(state: HealthState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler));

    if state.banner.is_some() {
        router = router.route("/", get(banner).fallback(unmatched_request));
    }

    router.with_state(state)
}

/// Attach the JSON fallback and the shared middleware stack.
pub fn finish_router(router: Router) -> Router {
    router
        .fallback(unmatched_request)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let request_id = request_id_from(req.headers()).unwrap_or_default();
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id = %request_id,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

/// Serve until Ctrl-C or SIGTERM, then drain in-flight requests.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
