//! Booking Handlers
//!
//! Booking lifecycle endpoints. Each handler parses the path, hands the
//! actor to the core and returns whatever the core committed.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use spacehub_core::{CancellationPreview, CreateBookingRequest, PaymentDetails};
use spacehub_types::{Booking, BookingId, CoreError};

use crate::dto::ReasonRequest;
use crate::error::ApiResult;
use crate::extractors::{parse_id, ApiJson, CurrentActor};
use crate::state::AppState;

fn booking_id(raw: &str) -> ApiResult<BookingId> {
    parse_id(raw, BookingId::parse)
}

/// Create a booking request. Guests book for themselves; admins for anyone.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<Booking>)> {
    if !actor.is_admin() && actor.user_id != request.guest_id {
        return Err(CoreError::unauthorized("bookings can only be made for yourself").into());
    }
    let booking = state.service.create_booking(request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Booking>> {
    let booking = state.service.get_booking(booking_id(&id)?, &actor).await?;
    Ok(Json(booking))
}

pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete_booking(booking_id(&id)?, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Capture payment. The body is tagged by `method` and must match the
/// booking's payment method.
pub async fn capture_payment(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(details): ApiJson<PaymentDetails>,
) -> ApiResult<Json<Booking>> {
    let booking = state
        .service
        .capture_payment(booking_id(&id)?, &actor, details)
        .await?;
    Ok(Json(booking))
}

pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Booking>> {
    let booking = state.service.confirm_booking(booking_id(&id)?, &actor).await?;
    Ok(Json(booking))
}

pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReasonRequest>,
) -> ApiResult<Json<Booking>> {
    let booking = state
        .service
        .reject_booking(booking_id(&id)?, &actor, &body.reason)
        .await?;
    Ok(Json(booking))
}

pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Booking>> {
    let booking = state.service.complete_booking(booking_id(&id)?, &actor).await?;
    Ok(Json(booking))
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReasonRequest>,
) -> ApiResult<Json<Booking>> {
    let booking = state
        .service
        .cancel_booking(booking_id(&id)?, &actor, &body.reason)
        .await?;
    Ok(Json(booking))
}

pub async fn preview_cancellation(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<CancellationPreview>> {
    let preview = state
        .service
        .preview_cancellation(booking_id(&id)?, &actor)
        .await?;
    Ok(Json(preview))
}
