use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::PayError;
use crate::models::ChargeStatus;

/// Charge-create parameters. Amounts cross this boundary already converted
/// to the gateway's minor units (cents).
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub destination: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    pub status: ChargeStatus,
    pub amount: i64,
    pub currency: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub details_submitted: bool,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct AccountLink {
    url: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// The payment gateway's charge/transfer/account API, behind a trait so the
/// orchestration services can be tested against an in-process double.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn create_charge(&self, req: ChargeRequest) -> Result<Charge, PayError>;
    async fn retrieve_charge(&self, charge_id: &str) -> Result<Charge, PayError>;
    async fn cancel_charge(&self, charge_id: &str) -> Result<Charge, PayError>;
    async fn create_transfer(&self, req: TransferRequest) -> Result<Transfer, PayError>;
    async fn create_account(
        &self,
        driver_id: &str,
        email: &str,
        country: &str,
    ) -> Result<Account, PayError>;
    async fn retrieve_account(&self, account_id: &str) -> Result<Account, PayError>;
    async fn create_account_link(
        &self,
        account_id: &str,
        return_url: &str,
        refresh_url: &str,
    ) -> Result<String, PayError>;
}

/// Stripe-shaped REST client: bearer auth, form-encoded bodies, bounded
/// request timeout.
pub struct StripeGateway {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(base_url: &str, secret_key: &str, timeout_ms: u64) -> Result<Self, PayError> {
        let timeout = Duration::from_millis(if timeout_ms > 0 { timeout_ms } else { 15_000 });
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| PayError::Config(format!("Failed to build gateway client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, PayError> {
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        Self::decode(response).await
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, PayError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::decode(response).await
    }

    async fn decode<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, PayError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| PayError::gateway(None, format!("Malformed gateway response: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<GatewayErrorBody>(&body) {
            Ok(parsed) => Err(PayError::Gateway {
                code: parsed.error.code,
                message: parsed
                    .error
                    .message
                    .unwrap_or_else(|| format!("Gateway returned {status}")),
            }),
            Err(_) => Err(PayError::gateway(None, format!("Gateway returned {status}"))),
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> PayError {
    if err.is_timeout() {
        PayError::gateway(Some("timeout".into()), "Gateway request timed out")
    } else {
        PayError::gateway(None, format!("Gateway request failed: {err}"))
    }
}

fn metadata_form(metadata: &HashMap<String, String>) -> impl Iterator<Item = (String, String)> + '_ {
    metadata
        .iter()
        .map(|(k, v)| (format!("metadata[{k}]"), v.clone()))
}

#[async_trait]
impl Gateway for StripeGateway {
    async fn create_charge(&self, req: ChargeRequest) -> Result<Charge, PayError> {
        let mut form = vec![
            ("amount".to_string(), req.amount_minor.to_string()),
            ("currency".to_string(), req.currency.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        form.extend(metadata_form(&req.metadata));

        self.post_form("/v1/payment_intents", &form, req.idempotency_key.as_deref())
            .await
    }

    async fn retrieve_charge(&self, charge_id: &str) -> Result<Charge, PayError> {
        self.get(&format!("/v1/payment_intents/{charge_id}")).await
    }

    async fn cancel_charge(&self, charge_id: &str) -> Result<Charge, PayError> {
        self.post_form(&format!("/v1/payment_intents/{charge_id}/cancel"), &[], None)
            .await
    }

    async fn create_transfer(&self, req: TransferRequest) -> Result<Transfer, PayError> {
        let mut form = vec![
            ("amount".to_string(), req.amount_minor.to_string()),
            ("currency".to_string(), req.currency.clone()),
            ("destination".to_string(), req.destination.clone()),
        ];
        form.extend(metadata_form(&req.metadata));

        self.post_form("/v1/transfers", &form, None).await
    }

    async fn create_account(
        &self,
        driver_id: &str,
        email: &str,
        country: &str,
    ) -> Result<Account, PayError> {
        let form = vec![
            ("type".to_string(), "express".to_string()),
            ("country".to_string(), country.to_string()),
            ("email".to_string(), email.to_string()),
            (
                "capabilities[transfers][requested]".to_string(),
                "true".to_string(),
            ),
            ("metadata[driverId]".to_string(), driver_id.to_string()),
        ];

        self.post_form("/v1/accounts", &form, None).await
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<Account, PayError> {
        self.get(&format!("/v1/accounts/{account_id}")).await
    }

    async fn create_account_link(
        &self,
        account_id: &str,
        return_url: &str,
        refresh_url: &str,
    ) -> Result<String, PayError> {
        let form = vec![
            ("account".to_string(), account_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
            ("refresh_url".to_string(), refresh_url.to_string()),
            ("type".to_string(), "account_onboarding".to_string()),
        ];

        let link: AccountLink = self.post_form("/v1/account_links", &form, None).await?;
        Ok(link.url)
    }
}
