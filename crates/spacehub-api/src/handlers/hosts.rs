//! Host Handlers
//!
//! Host-scoped reads and withdrawals. Every endpoint is open to the host
//! named in the path or to an admin.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use spacehub_core::{EarningsSummary, Withdrawal, WithdrawalReceipt, WithdrawalRequest};
use spacehub_types::{Actor, UserId, WithdrawalId};

use crate::dto::{BookingList, WithdrawalBody};
use crate::error::ApiResult;
use crate::extractors::{parse_id, ApiJson, CurrentActor};
use crate::state::AppState;

fn host_for(state: &AppState, actor: &Actor, raw: &str) -> ApiResult<UserId> {
    let host_id = parse_id(raw, UserId::parse)?;
    state.service.authorize_host(actor, host_id)?;
    Ok(host_id)
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(host_id): Path<String>,
) -> ApiResult<Json<BookingList>> {
    let host_id = host_for(&state, &actor, &host_id)?;
    let bookings = state.service.list_host_bookings(host_id).await?;
    Ok(Json(BookingList {
        count: bookings.len(),
        bookings,
    }))
}

pub async fn earnings_summary(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(host_id): Path<String>,
) -> ApiResult<Json<EarningsSummary>> {
    let host_id = host_for(&state, &actor, &host_id)?;
    Ok(Json(state.service.get_earnings_summary(host_id).await?))
}

pub async fn create_withdrawal(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(host_id): Path<String>,
    ApiJson(body): ApiJson<WithdrawalBody>,
) -> ApiResult<(StatusCode, Json<WithdrawalReceipt>)> {
    let host_id = parse_id(&host_id, UserId::parse)?;
    let request = WithdrawalRequest {
        host_id,
        amount: body.amount,
        method: body.method,
    };
    let receipt = state.service.process_withdrawal(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(host_id): Path<String>,
) -> ApiResult<Json<Vec<Withdrawal>>> {
    let host_id = host_for(&state, &actor, &host_id)?;
    Ok(Json(state.service.list_withdrawals(host_id).await?))
}

pub async fn get_withdrawal(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path((host_id, withdrawal_id)): Path<(String, String)>,
) -> ApiResult<Json<Withdrawal>> {
    let host_id = host_for(&state, &actor, &host_id)?;
    let withdrawal_id = parse_id(&withdrawal_id, WithdrawalId::parse)?;
    Ok(Json(state.service.get_withdrawal(host_id, withdrawal_id).await?))
}
