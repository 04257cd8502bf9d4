//! Bazaar commerce API library.
//!
//! The HTTP surface, repositories and services of the Bazaar backend,
//! exposed as a library so the binary, the CLI and the tests share them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, middleware as axum_middleware};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the CORS layer for the configured storefront origins.
///
/// Credentials are allowed so the session cookie travels with requests;
/// origins that are not valid header values are skipped.
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    use axum::http::{HeaderValue, Method, header};

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(middleware::request_id::REQUEST_ID_HEADER),
        ])
        .expose_headers([header::HeaderName::from_static(
            middleware::request_id::REQUEST_ID_HEADER,
        )])
}

/// Assemble the application router with its middleware stack.
///
/// Health checks sit outside `/api` and outside the session layer.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());
    let cors = cors_layer(&state.config().cors_origins);

    let api = routes::routes().layer(session_layer);

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/health/ready", axum::routing::get(readiness))
        .merge(api)
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::http::StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => axum::http::StatusCode::OK,
        Err(e) => {
            tracing::warn!("Readiness check failed: {e}");
            axum::http::StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_skips_invalid_origins() {
        // Building must not panic on a bad origin.
        let _layer = cors_layer(&[
            "https://shop.example.com".to_string(),
            "bad\norigin".to_string(),
        ]);
    }
}
