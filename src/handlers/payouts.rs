use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::error::PayError;
use crate::models::{ApiResponse, DriverPayout, PayoutStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayoutRequest {
    pub driver_id: String,
    pub order_id: String,
    pub order_total: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub route_id: Option<String>,
}

pub async fn create_payout(
    State(state): State<AppState>,
    Json(request): Json<CreatePayoutRequest>,
) -> Result<Json<ApiResponse<DriverPayout>>, PayError> {
    let currency = request.currency.as_deref().unwrap_or("usd");
    let payout = state
        .payouts
        .create_payout(
            &request.driver_id,
            &request.order_id,
            request.order_total,
            currency,
            request.route_id,
        )
        .await?;
    Ok(Json(ApiResponse::ok(payout)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutAttemptRequest {
    pub driver_gateway_account_id: String,
}

pub async fn attempt_payout(
    State(state): State<AppState>,
    Path(payout_id): Path<Uuid>,
    Json(request): Json<PayoutAttemptRequest>,
) -> Result<Json<ApiResponse<DriverPayout>>, PayError> {
    let payout = state
        .payouts
        .attempt_payout(payout_id, &request.driver_gateway_account_id)
        .await?;
    Ok(Json(ApiResponse::ok(payout)))
}

pub async fn retry_payout(
    State(state): State<AppState>,
    Path(payout_id): Path<Uuid>,
    Json(request): Json<PayoutAttemptRequest>,
) -> Result<Json<ApiResponse<DriverPayout>>, PayError> {
    let payout = state
        .payouts
        .retry_payout(payout_id, &request.driver_gateway_account_id)
        .await?;
    Ok(Json(ApiResponse::ok(payout)))
}

#[derive(Debug, Deserialize)]
pub struct PayoutListQuery {
    pub status: Option<PayoutStatus>,
}

pub async fn list_driver_payouts(
    State(state): State<AppState>,
    Path(driver_id): Path<String>,
    Query(query): Query<PayoutListQuery>,
) -> Result<Json<ApiResponse<Vec<DriverPayout>>>, PayError> {
    let payouts = state.payouts.list_payouts(&driver_id, query.status).await?;
    Ok(Json(ApiResponse::ok(payouts)))
}

pub async fn get_order_payout(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Option<DriverPayout>>>, PayError> {
    let payout = state.payouts.find_by_order(&order_id).await?;
    Ok(Json(ApiResponse::ok(payout)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectAccountRequest {
    pub driver_id: String,
    pub email: String,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectAccountResponse {
    pub account_id: String,
    pub details_submitted: bool,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
}

pub async fn create_connect_account(
    State(state): State<AppState>,
    Json(request): Json<CreateConnectAccountRequest>,
) -> Result<Json<ApiResponse<ConnectAccountResponse>>, PayError> {
    let country = request.country.as_deref().unwrap_or("US");
    let account = state
        .payouts
        .create_connect_account(&request.driver_id, &request.email, country)
        .await?;
    Ok(Json(ApiResponse::ok(ConnectAccountResponse {
        account_id: account.id,
        details_submitted: account.details_submitted,
        charges_enabled: account.charges_enabled,
        payouts_enabled: account.payouts_enabled,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountLinkRequest {
    pub account_id: String,
    pub return_url: String,
    pub refresh_url: String,
}

#[derive(Debug, Serialize)]
pub struct AccountLinkResponse {
    pub url: String,
}

pub async fn create_account_link(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountLinkRequest>,
) -> Result<Json<ApiResponse<AccountLinkResponse>>, PayError> {
    let url = state
        .payouts
        .create_account_link(&request.account_id, &request.return_url, &request.refresh_url)
        .await?;
    Ok(Json(ApiResponse::ok(AccountLinkResponse { url })))
}
