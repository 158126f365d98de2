use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::error::PayError;
use crate::models::{ChargeStatus, GatewayEvent};
use crate::services::payments::PaymentService;

type HmacSha256 = Hmac<Sha256>;

/// Verifies and dispatches the gateway's asynchronous webhook events,
/// folding them into the transaction ledger.
///
/// Signature verification runs over the raw request body, before any JSON
/// parsing, so a forged payload is never interpreted.
pub struct WebhookService {
    payments: Arc<PaymentService>,
    secret: Option<String>,
    tolerance_secs: i64,
}

impl WebhookService {
    pub fn new(payments: Arc<PaymentService>, secret: Option<String>, tolerance_secs: i64) -> Self {
        Self {
            payments,
            secret,
            tolerance_secs,
        }
    }

    pub async fn verify_and_dispatch(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<(), PayError> {
        self.verify_and_dispatch_at(payload, signature_header, Utc::now().timestamp())
            .await
    }

    async fn verify_and_dispatch_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now_epoch: i64,
    ) -> Result<(), PayError> {
        // A missing secret is a server misconfiguration; fail closed rather
        // than skipping verification.
        let secret = self
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PayError::Config("Webhook secret not configured".to_string()))?;

        verify_signature(
            payload,
            signature_header,
            secret,
            self.tolerance_secs,
            now_epoch,
        )?;

        let event: GatewayEvent = serde_json::from_slice(payload)
            .map_err(|e| PayError::Validation(format!("Invalid webhook payload: {e}")))?;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Processing webhook event"
        );

        self.dispatch(event).await;
        Ok(())
    }

    async fn dispatch(&self, event: GatewayEvent) {
        let charge = &event.data.object;

        match event.event_type.as_str() {
            "charge.succeeded" => {
                tracing::info!(
                    gateway_charge_id = %charge.id,
                    amount = charge.amount,
                    currency = charge.currency.as_deref().unwrap_or("-"),
                    "Charge succeeded"
                );
                self.payments
                    .update_status(&charge.id, ChargeStatus::Succeeded)
                    .await;
            }
            "charge.payment_failed" => {
                let last_error = charge
                    .last_payment_error
                    .as_ref()
                    .and_then(|e| e.message.as_deref())
                    .unwrap_or("Unknown error");
                tracing::warn!(
                    gateway_charge_id = %charge.id,
                    error = last_error,
                    "Charge payment failed"
                );
                self.payments.update_status(&charge.id, charge.status).await;
            }
            "charge.canceled" => {
                tracing::info!(gateway_charge_id = %charge.id, "Charge canceled");
                self.payments
                    .update_status(&charge.id, ChargeStatus::Canceled)
                    .await;
            }
            "charge.requires_action" => {
                tracing::info!(
                    gateway_charge_id = %charge.id,
                    "Charge requires customer action"
                );
                self.payments
                    .update_status(&charge.id, ChargeStatus::RequiresAction)
                    .await;
            }
            other => {
                // Forward compatibility: new gateway event types must not
                // break processing.
                tracing::debug!(event_type = other, "Unhandled webhook event type");
            }
        }
    }
}

/// Checks the gateway's `t=<unix>,v1=<hex>` signature header: HMAC-SHA256
/// over `"{t}.{raw body}"`, constant-time comparison, bounded clock skew.
fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: i64,
    now_epoch: i64,
) -> Result<(), PayError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse().ok();
            }
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PayError::SignatureInvalid("Missing timestamp in header".to_string()))?;

    if (now_epoch - timestamp).abs() > tolerance_secs {
        return Err(PayError::SignatureInvalid(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    if candidates.is_empty() {
        return Err(PayError::SignatureInvalid(
            "No v1 signature in header".to_string(),
        ));
    }

    for candidate in &candidates {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| PayError::Config(format!("Invalid webhook secret: {e}")))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        // verify_slice is constant-time.
        if mac.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }

    Err(PayError::SignatureInvalid(
        "Signature mismatch".to_string(),
    ))
}
