use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use fleetpay::client::{
    Account, Charge, ChargeRequest, Gateway, Transfer, TransferRequest,
};
use fleetpay::config::SecurityLimits;
use fleetpay::error::PayError;
use fleetpay::models::ChargeStatus;
use fleetpay::services::{
    InMemoryDriverDirectory, InMemoryPayoutStore, InMemoryTransactionStore, PaymentService,
    PayoutService, SecurityGuard, WebhookService,
};

pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// In-process gateway double for full-service flows. Charges echo a fixed
/// id; transfers can be toggled to fail.
pub struct ScriptedGateway {
    pub charge_id: String,
    pub charge_calls: AtomicU32,
    pub transfer_calls: AtomicU32,
    pub fail_transfers: AtomicBool,
}

impl ScriptedGateway {
    pub fn new(charge_id: &str) -> Self {
        Self {
            charge_id: charge_id.to_string(),
            charge_calls: AtomicU32::new(0),
            transfer_calls: AtomicU32::new(0),
            fail_transfers: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn create_charge(&self, req: ChargeRequest) -> Result<Charge, PayError> {
        self.charge_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Charge {
            id: self.charge_id.clone(),
            status: ChargeStatus::RequiresPaymentMethod,
            amount: req.amount_minor,
            currency: req.currency,
            client_secret: Some(format!("{}_secret", self.charge_id)),
        })
    }

    async fn retrieve_charge(&self, charge_id: &str) -> Result<Charge, PayError> {
        Ok(Charge {
            id: charge_id.to_string(),
            status: ChargeStatus::Processing,
            amount: 0,
            currency: "usd".into(),
            client_secret: None,
        })
    }

    async fn cancel_charge(&self, charge_id: &str) -> Result<Charge, PayError> {
        Ok(Charge {
            id: charge_id.to_string(),
            status: ChargeStatus::Canceled,
            amount: 0,
            currency: "usd".into(),
            client_secret: None,
        })
    }

    async fn create_transfer(&self, req: TransferRequest) -> Result<Transfer, PayError> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(PayError::gateway(
                Some("balance_insufficient".into()),
                "Insufficient funds",
            ));
        }
        Ok(Transfer {
            id: format!("tr_{}", self.transfer_calls.load(Ordering::SeqCst)),
            amount: req.amount_minor,
            currency: req.currency,
            destination: req.destination,
        })
    }

    async fn create_account(
        &self,
        driver_id: &str,
        _email: &str,
        _country: &str,
    ) -> Result<Account, PayError> {
        Ok(Account {
            id: format!("acct_{driver_id}"),
            details_submitted: false,
            charges_enabled: false,
            payouts_enabled: false,
        })
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<Account, PayError> {
        Ok(Account {
            id: account_id.to_string(),
            details_submitted: true,
            charges_enabled: true,
            payouts_enabled: true,
        })
    }

    async fn create_account_link(
        &self,
        account_id: &str,
        _return_url: &str,
        _refresh_url: &str,
    ) -> Result<String, PayError> {
        Ok(format!("https://connect.example/{account_id}"))
    }
}

pub struct TestApp {
    pub gateway: Arc<ScriptedGateway>,
    pub transactions: Arc<InMemoryTransactionStore>,
    pub payout_store: Arc<InMemoryPayoutStore>,
    pub drivers: Arc<InMemoryDriverDirectory>,
    pub payments: Arc<PaymentService>,
    pub payouts: PayoutService,
    pub webhooks: WebhookService,
}

pub fn test_app(charge_id: &str) -> TestApp {
    let gateway = Arc::new(ScriptedGateway::new(charge_id));
    let security = Arc::new(SecurityGuard::new(SecurityLimits::default()));
    let transactions = Arc::new(InMemoryTransactionStore::new());
    let payout_store = Arc::new(InMemoryPayoutStore::new());
    let drivers = Arc::new(InMemoryDriverDirectory::new());

    let payments = Arc::new(PaymentService::new(
        gateway.clone(),
        transactions.clone(),
        security.clone(),
    ));
    let payouts = PayoutService::new(
        gateway.clone(),
        payout_store.clone(),
        drivers.clone(),
        security,
    );
    let webhooks = WebhookService::new(payments.clone(), Some(WEBHOOK_SECRET.to_string()), 300);

    TestApp {
        gateway,
        transactions,
        payout_store,
        drivers,
        payments,
        payouts,
        webhooks,
    }
}

/// Builds a valid `t=...,v1=...` header for the given payload.
pub fn sign_payload(payload: &[u8], timestamp: i64) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}
