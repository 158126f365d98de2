use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::PayError;
use crate::models::{ChargeStatus, DriverPayout, PaymentTransaction, PayoutStatus};

/// Persistence port for customer charge records, keyed by the
/// gateway-assigned charge id.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Writes the transaction keyed by its charge id. A second write with
    /// the same charge id must not produce a second row.
    async fn upsert(&self, tx: PaymentTransaction) -> Result<(), PayError>;

    async fn find_by_charge_id(
        &self,
        charge_id: &str,
    ) -> Result<Option<PaymentTransaction>, PayError>;

    /// Overwrites the status of the matching row, if any. Returns whether a
    /// row matched.
    async fn set_status(&self, charge_id: &str, status: ChargeStatus) -> Result<bool, PayError>;
}

/// Persistence port for driver payout records.
#[async_trait]
pub trait PayoutStore: Send + Sync {
    async fn insert(&self, payout: DriverPayout) -> Result<(), PayError>;
    async fn get(&self, id: Uuid) -> Result<Option<DriverPayout>, PayError>;
    async fn update(&self, payout: DriverPayout) -> Result<(), PayError>;
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<DriverPayout>, PayError>;
    async fn find_by_driver(&self, driver_id: &str) -> Result<Vec<DriverPayout>, PayError>;
    async fn find_by_driver_and_status(
        &self,
        driver_id: &str,
        status: PayoutStatus,
    ) -> Result<Vec<DriverPayout>, PayError>;
}

/// Thread-safe in-memory transaction store.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<HashMap<String, PaymentTransaction>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn upsert(&self, tx: PaymentTransaction) -> Result<(), PayError> {
        let mut transactions = self.transactions.write().await;
        match transactions.get_mut(&tx.gateway_charge_id) {
            Some(existing) => {
                // The original row is the audit record; a replayed create
                // only refreshes the mutable fields.
                existing.status = tx.status;
                existing.amount = tx.amount;
                existing.currency = tx.currency;
                existing.updated_at = Utc::now();
            }
            None => {
                transactions.insert(tx.gateway_charge_id.clone(), tx);
            }
        }
        Ok(())
    }

    async fn find_by_charge_id(
        &self,
        charge_id: &str,
    ) -> Result<Option<PaymentTransaction>, PayError> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(charge_id).cloned())
    }

    async fn set_status(&self, charge_id: &str, status: ChargeStatus) -> Result<bool, PayError> {
        let mut transactions = self.transactions.write().await;
        match transactions.get_mut(charge_id) {
            Some(tx) => {
                tx.status = status;
                tx.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Thread-safe in-memory payout store with the secondary lookups the
/// payout service needs (order, driver, driver+status).
#[derive(Default, Clone)]
pub struct InMemoryPayoutStore {
    payouts: Arc<RwLock<HashMap<Uuid, DriverPayout>>>,
}

impl InMemoryPayoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayoutStore for InMemoryPayoutStore {
    async fn insert(&self, payout: DriverPayout) -> Result<(), PayError> {
        let mut payouts = self.payouts.write().await;
        payouts.insert(payout.id, payout);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DriverPayout>, PayError> {
        let payouts = self.payouts.read().await;
        Ok(payouts.get(&id).cloned())
    }

    async fn update(&self, payout: DriverPayout) -> Result<(), PayError> {
        let mut payouts = self.payouts.write().await;
        if !payouts.contains_key(&payout.id) {
            return Err(PayError::State(format!(
                "Payout not found for update: {}",
                payout.id
            )));
        }
        payouts.insert(payout.id, payout);
        Ok(())
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<DriverPayout>, PayError> {
        let payouts = self.payouts.read().await;
        Ok(payouts.values().find(|p| p.order_id == order_id).cloned())
    }

    async fn find_by_driver(&self, driver_id: &str) -> Result<Vec<DriverPayout>, PayError> {
        let payouts = self.payouts.read().await;
        let mut result: Vec<_> = payouts
            .values()
            .filter(|p| p.driver_id == driver_id)
            .cloned()
            .collect();
        result.sort_by_key(|p| p.created_at);
        Ok(result)
    }

    async fn find_by_driver_and_status(
        &self,
        driver_id: &str,
        status: PayoutStatus,
    ) -> Result<Vec<DriverPayout>, PayError> {
        let payouts = self.payouts.read().await;
        let mut result: Vec<_> = payouts
            .values()
            .filter(|p| p.driver_id == driver_id && p.status == status)
            .cloned()
            .collect();
        result.sort_by_key(|p| p.created_at);
        Ok(result)
    }
}
