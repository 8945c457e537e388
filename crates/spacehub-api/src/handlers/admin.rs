//! Admin Handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use spacehub_types::{CoreError, Earning};

use crate::error::ApiResult;
use crate::extractors::CurrentActor;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub promoted: usize,
    pub earnings: Vec<Earning>,
}

/// Run the pending-earnings promotion sweep on demand.
pub async fn run_promotion_sweep(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<SweepResponse>> {
    if !actor.is_admin() {
        return Err(CoreError::unauthorized("admin only").into());
    }
    let earnings = state.service.run_promotion_sweep().await?;
    Ok(Json(SweepResponse {
        promoted: earnings.len(),
        earnings,
    }))
}
