use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::client::{ChargeRequest, Gateway};
use crate::error::PayError;
use crate::models::{to_minor_units, ChargeStatus, PaymentTransaction};
use crate::services::ledger::TransactionStore;
use crate::services::security::SecurityGuard;

/// ISO 4217 codes the gateway account accepts.
const SUPPORTED_CURRENCIES: &[&str] = &[
    "usd", "eur", "gbp", "cad", "aud", "jpy", "chf", "nzd", "sek", "nok", "dkk",
];

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCharge {
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChargeCreated {
    pub client_secret: String,
    pub gateway_charge_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChargeState {
    pub status: ChargeStatus,
    pub gateway_charge_id: String,
}

/// Creates and tracks customer charges against the gateway.
pub struct PaymentService {
    gateway: Arc<dyn Gateway>,
    transactions: Arc<dyn TransactionStore>,
    security: Arc<SecurityGuard>,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        transactions: Arc<dyn TransactionStore>,
        security: Arc<SecurityGuard>,
    ) -> Self {
        Self {
            gateway,
            transactions,
            security,
        }
    }

    pub async fn create_charge(&self, request: CreateCharge) -> Result<ChargeCreated, PayError> {
        if request.amount <= Decimal::ZERO {
            tracing::warn!(amount = %request.amount, "Invalid charge amount");
            return Err(PayError::Validation(
                "Amount must be greater than 0".to_string(),
            ));
        }

        let currency = request
            .currency
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "usd".to_string());

        if !SUPPORTED_CURRENCIES.contains(&currency.as_str()) {
            tracing::warn!(currency, "Unsupported currency");
            return Err(PayError::Validation(format!(
                "Unsupported currency: {currency}. Supported currencies: {SUPPORTED_CURRENCIES:?}"
            )));
        }

        // An unauthenticated caller shares the "unknown" rate/amount bucket.
        let user_id = request
            .metadata
            .get("userId")
            .filter(|id| !id.is_empty())
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        let order_id = request
            .metadata
            .get("orderId")
            .filter(|id| !id.is_empty())
            .cloned();

        if let Err(err) = self.run_security_checks(&request, &user_id, order_id.as_deref()) {
            self.security.log_security_event(
                "PAYMENT_VALIDATION_FAILED",
                &user_id,
                &format!("amount={}, reason={}", request.amount, err),
            );
            return Err(err);
        }

        if let Some(key) = &request.idempotency_key {
            tracing::info!(idempotency_key = %key, "Creating charge with idempotency key");
        }

        let charge = self
            .gateway
            .create_charge(ChargeRequest {
                amount_minor: to_minor_units(request.amount)?,
                currency: currency.clone(),
                metadata: request.metadata.clone(),
                idempotency_key: request.idempotency_key.clone(),
            })
            .await?;

        tracing::info!(
            gateway_charge_id = %charge.id,
            status = %charge.status,
            amount = %request.amount,
            currency,
            "Gateway charge created"
        );

        // Best-effort denormalized row; the charge exists at the gateway
        // regardless, and webhook replay can reconstruct it.
        if let Some(order_id) = order_id {
            let tx = PaymentTransaction::new(
                order_id.clone(),
                charge.id.clone(),
                request.amount,
                currency,
                charge.status,
            );
            match self.transactions.upsert(tx).await {
                Ok(()) => tracing::info!(
                    order_id,
                    gateway_charge_id = %charge.id,
                    "Payment transaction saved"
                ),
                Err(err) => tracing::error!(
                    order_id,
                    gateway_charge_id = %charge.id,
                    error = %err,
                    "Failed to save payment transaction"
                ),
            }
        }

        let client_secret = charge.client_secret.ok_or_else(|| {
            PayError::gateway(None, "Gateway response missing client secret")
        })?;

        Ok(ChargeCreated {
            client_secret,
            gateway_charge_id: charge.id,
        })
    }

    fn run_security_checks(
        &self,
        request: &CreateCharge,
        user_id: &str,
        order_id: Option<&str>,
    ) -> Result<(), PayError> {
        self.security.validate_amount(request.amount, user_id)?;
        self.security
            .check_rate_limit(user_id, "/api/payments/create-intent")?;
        self.security
            .detect_suspicious_activity(user_id, request.amount, order_id);
        Ok(())
    }

    pub async fn confirm_charge(&self, charge_id: &str) -> Result<ChargeState, PayError> {
        let charge = self.gateway.retrieve_charge(charge_id).await?;
        self.update_status(&charge.id, charge.status).await;

        Ok(ChargeState {
            status: charge.status,
            gateway_charge_id: charge.id,
        })
    }

    pub async fn cancel_charge(&self, charge_id: &str) -> Result<ChargeState, PayError> {
        let charge = self.gateway.cancel_charge(charge_id).await?;
        self.update_status(&charge.id, charge.status).await;

        Ok(ChargeState {
            status: charge.status,
            gateway_charge_id: charge.id,
        })
    }

    /// Folds a charge status into the local ledger. Last write wins; a
    /// charge id with no local row is a valid no-op (the order may not be
    /// tracked here). Never fails the caller.
    pub async fn update_status(&self, charge_id: &str, status: ChargeStatus) {
        match self.transactions.set_status(charge_id, status).await {
            Ok(true) => tracing::info!(
                gateway_charge_id = charge_id,
                status = %status,
                "Payment transaction status updated"
            ),
            Ok(false) => tracing::debug!(
                gateway_charge_id = charge_id,
                "No local transaction for charge; skipping status update"
            ),
            Err(err) => tracing::error!(
                gateway_charge_id = charge_id,
                status = %status,
                error = %err,
                "Failed to update payment transaction status"
            ),
        }
    }
}
