//! SpaceHub REST API
//!
//! Thin HTTP surface over [`spacehub_core::BookingService`].
//!
//! # API Structure
//!
//! ```text
//! /health                                         - liveness
//! /ready                                          - readiness (storage)
//! /api/v1/
//! ├── POST   /bookings                             - create
//! ├── GET    /bookings/:id                         - read
//! ├── DELETE /bookings/:id                         - delete (not while confirmed)
//! ├── POST   /bookings/:id/payment                 - capture payment
//! ├── POST   /bookings/:id/{confirm,reject,complete,cancel}
//! ├── GET    /bookings/:id/cancellation-preview
//! ├── GET    /hosts/:host_id/bookings
//! ├── GET    /hosts/:host_id/earnings/summary
//! ├── GET    /hosts/:host_id/withdrawals
//! ├── POST   /hosts/:host_id/withdrawals
//! ├── GET    /hosts/:host_id/withdrawals/:withdrawal_id
//! └── POST   /admin/promotions/sweep
//! ```
//!
//! Every `/api/v1` request carries `X-Actor-Id` and `X-Actor-Role`
//! (`guest`, `host` or `admin`), set by the authenticating gateway.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enable_cors: bool,
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
    pub enable_tracing: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
            enable_tracing: true,
        }
    }
}

/// Create the main API router with all middleware
pub fn create_router(state: Arc<AppState>, config: &ApiConfig) -> Router {
    let mut router = create_test_router(state);

    if config.enable_tracing {
        router = router.layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let actor = request
                    .headers()
                    .get(extractors::ACTOR_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("anonymous");

                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    actor = %actor,
                )
            },
        ));
    }

    if config.enable_cors {
        let cors = if config.cors_origins.iter().any(|o| o == "*") {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(
                    config
                        .cors_origins
                        .iter()
                        .filter_map(|o| o.parse().ok())
                        .collect::<Vec<_>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
        };
        router = router.layer(cors);
    }

    router
}

/// Router without middleware, for tests
pub fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_v1_routes())
        .route("/health", axum::routing::get(handlers::health::health_check))
        .route("/ready", axum::routing::get(handlers::health::readiness_check))
        .with_state(state)
}
