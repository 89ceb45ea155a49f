use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use concierge_core::error::ApiError;
use concierge_core::pool::SlotStatus;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::ApiKey;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/pool", get(pool_status))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PoolStatusResponse {
    pub capacity: usize,
    pub claimed: usize,
    pub slots: Vec<SlotStatus>,
}

/// Which session each agent is pinned to
#[utoipa::path(
    get,
    path = "/v1/pool",
    responses(
        (status = 200, description = "Pool occupancy", body = PoolStatusResponse),
        (status = 401, description = "Missing or invalid API key", body = ApiError)
    ),
    security(("api_key" = [])),
    tag = "system"
)]
pub async fn pool_status(State(state): State<AppState>, _key: ApiKey) -> Json<PoolStatusResponse> {
    let slots = state.pool().snapshot();
    Json(PoolStatusResponse {
        capacity: slots.len(),
        claimed: slots.iter().filter(|s| s.session.is_some()).count(),
        slots,
    })
}
