use axum::{body::Bytes, extract::State, http::HeaderMap};

use super::AppState;
use crate::error::PayError;

/// Receives the gateway's signed webhook deliveries. The raw body is
/// verified before parsing; a signature failure returns a client error with
/// no state change, while processing failures return a server error so the
/// gateway's retry mechanism redelivers the event.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, PayError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| PayError::SignatureInvalid("Missing signature header".to_string()))?;

    state.webhooks.verify_and_dispatch(&body, signature).await?;
    Ok("Webhook processed successfully")
}
