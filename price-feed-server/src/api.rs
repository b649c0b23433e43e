use crate::{error::ApiError, state::AppState};
use axum::{
    Json,
    extract::{Path, State},
};
use price_feed::{Interval, PriceHistory, PriceSample};
use serde::Serialize;
use tracing::info;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub connected_clients: usize,
    pub has_current: bool,
}

/// `GET /api/prices/current`
pub async fn current_price(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PriceSample>>, ApiError> {
    state
        .store()
        .current()
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::not_found("no price sample computed yet"))
}

/// `GET /api/prices/history/{interval}`
pub async fn price_history(
    State(state): State<AppState>,
    Path(interval): Path<String>,
) -> Result<Json<ApiResponse<PriceHistory>>, ApiError> {
    let interval = interval
        .parse::<Interval>()
        .map_err(|error| ApiError::bad_request(error.to_string()))?;

    Ok(ApiResponse::ok(state.store().history(interval)))
}

/// `POST /api/prices/update`
pub async fn trigger_update(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PriceSample>>, ApiError> {
    info!("admin price refresh requested");
    let sample = state.scheduler().refresh().await?;
    Ok(ApiResponse::ok(sample))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<Health>> {
    ApiResponse::ok(Health {
        connected_clients: state.hub().connected_clients(),
        has_current: state.store().current().is_some(),
    })
}
