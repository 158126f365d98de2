use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::client::{Account, Gateway, TransferRequest};
use crate::error::PayError;
use crate::models::{to_minor_units, DriverPayout, PayoutStatus};
use crate::services::drivers::DriverDirectory;
use crate::services::ledger::PayoutStore;
use crate::services::security::SecurityGuard;

/// Computes driver shares, persists payouts and moves money to driver
/// accounts via gateway transfers.
pub struct PayoutService {
    gateway: Arc<dyn Gateway>,
    payouts: Arc<dyn PayoutStore>,
    drivers: Arc<dyn DriverDirectory>,
    security: Arc<SecurityGuard>,
}

impl PayoutService {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        payouts: Arc<dyn PayoutStore>,
        drivers: Arc<dyn DriverDirectory>,
        security: Arc<SecurityGuard>,
    ) -> Self {
        Self {
            gateway,
            payouts,
            drivers,
            security,
        }
    }

    /// Creates the driver's payout for a completed order and fires a
    /// best-effort automatic transfer attempt. Once validation passes,
    /// creation succeeds regardless of the attempt's outcome.
    pub async fn create_payout(
        &self,
        driver_id: &str,
        order_id: &str,
        order_total: Decimal,
        currency: &str,
        route_id: Option<String>,
    ) -> Result<DriverPayout, PayError> {
        if order_total <= Decimal::ZERO {
            return Err(PayError::Validation(
                "Order total must be greater than 0".to_string(),
            ));
        }

        if let Err(err) = self.run_security_checks(driver_id, order_id, order_total) {
            self.security.log_security_event(
                "DRIVER_PAYOUT_VALIDATION_FAILED",
                driver_id,
                &format!("orderId={order_id}, amount={order_total}, reason={err}"),
            );
            return Err(err);
        }

        // One payout per order, enforced by lookup: a duplicate submission
        // returns the existing record unchanged.
        if let Some(existing) = self.payouts.find_by_order_id(order_id).await? {
            tracing::info!(
                payout_id = %existing.id,
                order_id,
                "Payout already exists for order"
            );
            return Ok(existing);
        }

        let payout = DriverPayout::for_order(
            driver_id,
            order_id,
            order_total,
            currency.to_lowercase(),
            route_id,
        );
        self.payouts.insert(payout.clone()).await?;

        self.security.log_security_event(
            "DRIVER_PAYOUT_CREATED",
            driver_id,
            &format!("orderId={order_id}, amount={}", payout.amount),
        );
        tracing::info!(
            payout_id = %payout.id,
            driver_id,
            order_id,
            amount = %payout.amount,
            "Created driver payout"
        );

        self.attempt_automatic_payout(&payout).await;

        // Report the post-attempt state back to the caller.
        Ok(self.payouts.get(payout.id).await?.unwrap_or(payout))
    }

    fn run_security_checks(
        &self,
        driver_id: &str,
        order_id: &str,
        order_total: Decimal,
    ) -> Result<(), PayError> {
        self.security.validate_amount(order_total, driver_id)?;
        self.security.check_rate_limit(driver_id, "/api/payouts")?;
        self.security
            .detect_suspicious_activity(driver_id, order_total, Some(order_id));
        Ok(())
    }

    /// Fires the automatic transfer attempt. Failures are logged and never
    /// surface to the creator; a driver without a payout account leaves the
    /// payout pending, which is an expected state.
    async fn attempt_automatic_payout(&self, payout: &DriverPayout) {
        let account_id = match self.drivers.lookup_gateway_account_id(&payout.driver_id).await {
            Ok(Some(account_id)) => account_id,
            Ok(None) => {
                tracing::info!(
                    driver_id = %payout.driver_id,
                    payout_id = %payout.id,
                    "Driver has not onboarded for payouts; leaving payout pending"
                );
                return;
            }
            Err(err) => {
                tracing::warn!(
                    driver_id = %payout.driver_id,
                    payout_id = %payout.id,
                    error = %err,
                    "Driver directory lookup failed during automatic payout"
                );
                return;
            }
        };

        tracing::info!(
            payout_id = %payout.id,
            driver_id = %payout.driver_id,
            gateway_account_id = %account_id,
            "Attempting automatic payout"
        );

        match self.attempt_payout(payout.id, &account_id).await {
            Ok(paid) => tracing::info!(
                payout_id = %paid.id,
                transfer_id = paid.gateway_transfer_id.as_deref().unwrap_or("-"),
                "Automatic payout successful"
            ),
            Err(err) => tracing::error!(
                payout_id = %payout.id,
                error = %err,
                "Automatic payout failed; payout remains retryable"
            ),
        }
    }

    /// Transfers a pending payout to the driver's gateway account. Fails
    /// fast with a state error when the payout is not pending, so an
    /// already-paid payout can never be transferred twice from this side.
    pub async fn attempt_payout(
        &self,
        payout_id: Uuid,
        gateway_account_id: &str,
    ) -> Result<DriverPayout, PayError> {
        let payout = self.load(payout_id).await?;

        if payout.status != PayoutStatus::Pending {
            return Err(PayError::State(format!(
                "Payout is not in pending status (current: {})",
                payout.status
            )));
        }

        self.transfer(payout, gateway_account_id).await
    }

    /// Re-runs a pending or failed payout. A failed payout is reset to
    /// pending first; a paid payout always fails fast without touching the
    /// gateway.
    pub async fn retry_payout(
        &self,
        payout_id: Uuid,
        gateway_account_id: &str,
    ) -> Result<DriverPayout, PayError> {
        let mut payout = self.load(payout_id).await?;

        match payout.status {
            PayoutStatus::Paid => {
                return Err(PayError::State(
                    "Payout has already been paid".to_string(),
                ));
            }
            PayoutStatus::Failed => {
                payout.reset_to_pending();
                self.payouts.update(payout.clone()).await?;
                tracing::info!(payout_id = %payout.id, "Failed payout reset to pending for retry");
            }
            PayoutStatus::Pending => {}
        }

        self.transfer(payout, gateway_account_id).await
    }

    async fn transfer(
        &self,
        mut payout: DriverPayout,
        gateway_account_id: &str,
    ) -> Result<DriverPayout, PayError> {
        let amount_minor = to_minor_units(payout.amount)?;

        let result = self
            .gateway
            .create_transfer(TransferRequest {
                amount_minor,
                currency: payout.currency.clone(),
                destination: gateway_account_id.to_string(),
                metadata: HashMap::from([
                    ("orderId".to_string(), payout.order_id.clone()),
                    ("driverId".to_string(), payout.driver_id.clone()),
                ]),
            })
            .await;

        match result {
            Ok(transfer) => {
                payout.mark_paid(&transfer.id);
                self.payouts.update(payout.clone()).await?;
                tracing::info!(
                    payout_id = %payout.id,
                    transfer_id = %transfer.id,
                    amount = %payout.amount,
                    "Driver payout processed"
                );
                Ok(payout)
            }
            Err(err) => {
                // A timeout may or may not have landed at the gateway; only
                // an explicit success response marks the payout paid.
                tracing::error!(
                    payout_id = %payout.id,
                    error = %err,
                    "Failed to process driver payout"
                );
                payout.mark_failed();
                if let Err(store_err) = self.payouts.update(payout).await {
                    tracing::error!(
                        error = %store_err,
                        "Failed to record payout failure"
                    );
                }
                Err(err)
            }
        }
    }

    pub async fn list_payouts(
        &self,
        driver_id: &str,
        status: Option<PayoutStatus>,
    ) -> Result<Vec<DriverPayout>, PayError> {
        match status {
            Some(status) => self.payouts.find_by_driver_and_status(driver_id, status).await,
            None => self.payouts.find_by_driver(driver_id).await,
        }
    }

    pub async fn find_by_order(&self, order_id: &str) -> Result<Option<DriverPayout>, PayError> {
        self.payouts.find_by_order_id(order_id).await
    }

    /// Creates a Connect Express account for the driver and records the
    /// mapping in the driver directory.
    pub async fn create_connect_account(
        &self,
        driver_id: &str,
        email: &str,
        country: &str,
    ) -> Result<Account, PayError> {
        let account = self.gateway.create_account(driver_id, email, country).await?;
        self.drivers.register(driver_id, &account.id).await?;

        tracing::info!(
            account_id = %account.id,
            driver_id,
            "Created gateway payout account"
        );
        Ok(account)
    }

    pub async fn create_account_link(
        &self,
        account_id: &str,
        return_url: &str,
        refresh_url: &str,
    ) -> Result<String, PayError> {
        let url = self
            .gateway
            .create_account_link(account_id, return_url, refresh_url)
            .await?;
        tracing::info!(account_id, "Created account onboarding link");
        Ok(url)
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Account, PayError> {
        self.gateway.retrieve_account(account_id).await
    }

    async fn load(&self, payout_id: Uuid) -> Result<DriverPayout, PayError> {
        self.payouts
            .get(payout_id)
            .await?
            .ok_or_else(|| PayError::Validation(format!("Driver payout not found: {payout_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Charge, ChargeRequest, Transfer};
    use crate::config::SecurityLimits;
    use crate::services::drivers::InMemoryDriverDirectory;
    use crate::services::ledger::InMemoryPayoutStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Gateway double counting transfer calls; can be toggled to fail.
    struct FakeGateway {
        transfer_calls: AtomicU32,
        fail_transfers: AtomicBool,
    }

    impl FakeGateway {
        fn new() -> Self {
            Self {
                transfer_calls: AtomicU32::new(0),
                fail_transfers: AtomicBool::new(false),
            }
        }

        fn failing() -> Self {
            let gateway = Self::new();
            gateway.fail_transfers.store(true, Ordering::SeqCst);
            gateway
        }

        fn transfer_count(&self) -> u32 {
            self.transfer_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Gateway for FakeGateway {
        async fn create_charge(&self, _req: ChargeRequest) -> Result<Charge, PayError> {
            unreachable!("payout tests never create charges")
        }

        async fn retrieve_charge(&self, _charge_id: &str) -> Result<Charge, PayError> {
            unreachable!()
        }

        async fn cancel_charge(&self, _charge_id: &str) -> Result<Charge, PayError> {
            unreachable!()
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
                id: "tr_1".to_string(),
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

    struct Fixture {
        gateway: Arc<FakeGateway>,
        store: Arc<InMemoryPayoutStore>,
        directory: Arc<InMemoryDriverDirectory>,
        service: PayoutService,
    }

    fn fixture(gateway: FakeGateway) -> Fixture {
        let gateway = Arc::new(gateway);
        let store = Arc::new(InMemoryPayoutStore::new());
        let directory = Arc::new(InMemoryDriverDirectory::new());
        let service = PayoutService::new(
            gateway.clone(),
            store.clone(),
            directory.clone(),
            Arc::new(SecurityGuard::new(SecurityLimits::default())),
        );
        Fixture {
            gateway,
            store,
            directory,
            service,
        }
    }

    #[tokio::test]
    async fn create_payout_computes_eighty_percent_share() {
        let f = fixture(FakeGateway::new());
        let payout = f
            .service
            .create_payout("d1", "o1", dec!(12.50), "USD", None)
            .await
            .unwrap();

        assert_eq!(payout.amount, dec!(10.00));
        assert_eq!(payout.currency, "usd");
        assert_eq!(payout.status, PayoutStatus::Pending);
    }

    #[tokio::test]
    async fn driver_without_account_leaves_payout_pending() {
        let f = fixture(FakeGateway::new());
        let payout = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();

        assert_eq!(payout.status, PayoutStatus::Pending);
        assert_eq!(f.gateway.transfer_count(), 0);
    }

    #[tokio::test]
    async fn onboarded_driver_is_paid_automatically() {
        let f = fixture(FakeGateway::new());
        f.directory.register("d1", "acct_d1").await.unwrap();

        let payout = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();

        assert_eq!(payout.status, PayoutStatus::Paid);
        assert_eq!(payout.gateway_transfer_id.as_deref(), Some("tr_1"));
        assert!(payout.paid_at.is_some());
        assert_eq!(f.gateway.transfer_count(), 1);
    }

    #[tokio::test]
    async fn automatic_payout_failure_does_not_fail_creation() {
        let f = fixture(FakeGateway::failing());
        f.directory.register("d1", "acct_d1").await.unwrap();

        let payout = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();

        // Creation succeeded; the payout recorded the failed attempt.
        assert_eq!(payout.status, PayoutStatus::Failed);
        assert_eq!(f.gateway.transfer_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_order_returns_the_existing_payout() {
        let f = fixture(FakeGateway::new());
        let first = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();
        let second = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(f.store.find_by_driver("d1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_non_positive_order_total() {
        let f = fixture(FakeGateway::new());
        let err = f
            .service
            .create_payout("d1", "o1", dec!(0.00), "usd", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::Validation(_)));
    }

    #[tokio::test]
    async fn order_total_above_limit_is_rejected() {
        let f = fixture(FakeGateway::new());
        let err = f
            .service
            .create_payout("d1", "o1", dec!(10000.01), "usd", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::AmountOutOfRange(_)));
    }

    #[tokio::test]
    async fn attempt_payout_pays_a_pending_payout() {
        let f = fixture(FakeGateway::new());
        let created = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();

        let paid = f.service.attempt_payout(created.id, "acct_d1").await.unwrap();
        assert_eq!(paid.status, PayoutStatus::Paid);
        assert_eq!(paid.gateway_transfer_id.as_deref(), Some("tr_1"));
    }

    #[tokio::test]
    async fn attempt_payout_on_paid_payout_never_reaches_the_gateway() {
        let f = fixture(FakeGateway::new());
        let created = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();
        f.service.attempt_payout(created.id, "acct_d1").await.unwrap();
        assert_eq!(f.gateway.transfer_count(), 1);

        let err = f
            .service
            .attempt_payout(created.id, "acct_d1")
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::State(_)));
        assert_eq!(f.gateway.transfer_count(), 1);
    }

    #[tokio::test]
    async fn attempt_payout_on_unknown_id_fails() {
        let f = fixture(FakeGateway::new());
        let err = f
            .service
            .attempt_payout(Uuid::new_v4(), "acct_d1")
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::Validation(_)));
        assert_eq!(f.gateway.transfer_count(), 0);
    }

    #[tokio::test]
    async fn gateway_failure_marks_payout_failed_and_propagates() {
        let f = fixture(FakeGateway::failing());
        let created = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();

        let err = f
            .service
            .attempt_payout(created.id, "acct_d1")
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::Gateway { .. }));

        let stored = f.store.get(created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PayoutStatus::Failed);
        assert!(stored.gateway_transfer_id.is_none());
    }

    #[tokio::test]
    async fn retry_resets_a_failed_payout_and_pays_it() {
        let f = fixture(FakeGateway::failing());
        let created = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();
        let _ = f.service.attempt_payout(created.id, "acct_d1").await;
        assert_eq!(
            f.store.get(created.id).await.unwrap().unwrap().status,
            PayoutStatus::Failed
        );

        f.gateway.fail_transfers.store(false, Ordering::SeqCst);
        let paid = f.service.retry_payout(created.id, "acct_d1").await.unwrap();
        assert_eq!(paid.status, PayoutStatus::Paid);
    }

    #[tokio::test]
    async fn retry_on_paid_payout_fails_fast() {
        let f = fixture(FakeGateway::new());
        let created = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();
        f.service.attempt_payout(created.id, "acct_d1").await.unwrap();
        assert_eq!(f.gateway.transfer_count(), 1);

        let err = f
            .service
            .retry_payout(created.id, "acct_d1")
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::State(_)));
        assert_eq!(f.gateway.transfer_count(), 1);
    }

    #[tokio::test]
    async fn list_payouts_filters_by_status() {
        let f = fixture(FakeGateway::new());
        let a = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();
        f.service
            .create_payout("d1", "o2", dec!(60.00), "usd", None)
            .await
            .unwrap();
        f.service.attempt_payout(a.id, "acct_d1").await.unwrap();

        let all = f.service.list_payouts("d1", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let paid = f
            .service
            .list_payouts("d1", Some(PayoutStatus::Paid))
            .await
            .unwrap();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].id, a.id);
    }

    #[tokio::test]
    async fn connect_account_registers_the_directory_mapping() {
        let f = fixture(FakeGateway::new());
        let account = f
            .service
            .create_connect_account("d1", "d1@example.com", "US")
            .await
            .unwrap();
        assert_eq!(account.id, "acct_d1");

        assert_eq!(
            f.directory.lookup_gateway_account_id("d1").await.unwrap(),
            Some("acct_d1".to_string())
        );

        // The next payout for this driver now pays out automatically.
        let payout = f
            .service
            .create_payout("d1", "o1", dec!(50.00), "usd", None)
            .await
            .unwrap();
        assert_eq!(payout.status, PayoutStatus::Paid);
    }
}
