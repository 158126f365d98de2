use axum::{extract::State, Json};
use serde::Deserialize;

use super::AppState;
use crate::error::PayError;
use crate::models::ApiResponse;
use crate::services::{ChargeCreated, ChargeState, CreateCharge};

pub async fn create_charge(
    State(state): State<AppState>,
    Json(request): Json<CreateCharge>,
) -> Result<Json<ApiResponse<ChargeCreated>>, PayError> {
    let created = state.payments.create_charge(request).await?;
    Ok(Json(ApiResponse::ok(created)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeActionRequest {
    pub gateway_charge_id: String,
}

pub async fn confirm_charge(
    State(state): State<AppState>,
    Json(request): Json<ChargeActionRequest>,
) -> Result<Json<ApiResponse<ChargeState>>, PayError> {
    let charge_state = state
        .payments
        .confirm_charge(&request.gateway_charge_id)
        .await?;
    Ok(Json(ApiResponse::ok(charge_state)))
}

pub async fn cancel_charge(
    State(state): State<AppState>,
    Json(request): Json<ChargeActionRequest>,
) -> Result<Json<ApiResponse<ChargeState>>, PayError> {
    let charge_state = state
        .payments
        .cancel_charge(&request.gateway_charge_id)
        .await?;
    Ok(Json(ApiResponse::ok(charge_state)))
}
