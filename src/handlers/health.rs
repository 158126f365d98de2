use axum::{extract::State, Json};
use chrono::Utc;

use super::AppState;
use crate::models::HealthStatus;

pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let status = if state.webhook_configured {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        gateway_configured: true,
        webhook_configured: state.webhook_configured,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
    })
}
