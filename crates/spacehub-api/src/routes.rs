//! API Routes

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Create API v1 routes
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/bookings", booking_routes())
        .nest("/hosts/:host_id", host_routes())
        .route(
            "/admin/promotions/sweep",
            post(handlers::admin::run_promotion_sweep),
        )
}

fn booking_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::bookings::create_booking))
        .route(
            "/:booking_id",
            get(handlers::bookings::get_booking).delete(handlers::bookings::delete_booking),
        )
        .route("/:booking_id/payment", post(handlers::bookings::capture_payment))
        .route("/:booking_id/confirm", post(handlers::bookings::confirm_booking))
        .route("/:booking_id/reject", post(handlers::bookings::reject_booking))
        .route("/:booking_id/complete", post(handlers::bookings::complete_booking))
        .route("/:booking_id/cancel", post(handlers::bookings::cancel_booking))
        .route(
            "/:booking_id/cancellation-preview",
            get(handlers::bookings::preview_cancellation),
        )
}

fn host_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(handlers::hosts::list_bookings))
        .route("/earnings/summary", get(handlers::hosts::earnings_summary))
        .route(
            "/withdrawals",
            get(handlers::hosts::list_withdrawals).post(handlers::hosts::create_withdrawal),
        )
        .route(
            "/withdrawals/:withdrawal_id",
            get(handlers::hosts::get_withdrawal),
        )
}
