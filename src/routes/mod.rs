//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the dashboard-client HTTP API, the worker ingestion
//! endpoints, and the two broadcast sockets under a single Axum router.
//! Cross-cutting layers, from outermost: panic boundary, request tracing,
//! CORS for the configured web client origin.

pub mod auth;
pub mod dashboards;
pub mod error;
pub mod workers;
pub mod ws;

use std::any::Any;
use std::time::Duration;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::Config;
use crate::state::AppState;

pub const BANNER: &str = "Spirit by Greygarden.";
const CORS_MAX_AGE: Duration = Duration::from_secs(300);

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(banner))
        .route("/healthz", get(healthz))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/dashboards", get(dashboards::list_dashboards))
        .route("/get_dashboard", get(dashboards::get_dashboard))
        .route("/create_dashboard", post(dashboards::create_dashboard))
        .route("/update_dashboard", post(dashboards::update_dashboard))
        .route("/delete_dashboard", post(dashboards::delete_dashboard))
        .route("/dashboard_components", get(dashboards::dashboard_components))
        .route("/create_graph", post(dashboards::create_graph))
        .route("/update_graph", post(dashboards::update_graph))
        .route("/delete_graph", post(dashboards::delete_graph))
        .route("/create_control", post(dashboards::create_control))
        .route("/update_control", post(dashboards::update_control))
        .route("/delete_control", post(dashboards::delete_control))
        .route("/workers", get(workers::list_workers))
        .route("/worker_controls", get(workers::list_worker_controls))
        .route("/metrics_list", get(workers::list_metrics))
        .route("/metrics", get(workers::bucketed_metrics).post(workers::report_metric))
        .route("/metric_min", get(workers::metric_min))
        .route("/metric_max", get(workers::metric_max))
        .route("/update_control_value", post(workers::update_control_value))
        .route("/create_worker_control", post(workers::create_worker_control))
        .route("/ws/metrics", get(ws::metrics_socket))
        .route("/ws/manager", get(ws::manager_socket))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

pub(crate) fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
            Method::HEAD,
        ])
        .allow_headers([
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-requested-with"),
            CONTENT_TYPE,
        ])
        .max_age(CORS_MAX_AGE);

    match config.web_client_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(_)) => {
            warn!(web_client_url = ?config.web_client_url, "web client url is not a valid origin; CORS disabled");
            cors
        }
        None => cors,
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "internal error".to_owned()
    };
    error!(panic = %message, "handler panicked");
    (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
}

async fn banner() -> &'static str {
    BANNER
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
