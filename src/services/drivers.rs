use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::PayError;

/// Directory of driver payout accounts. Absence of a mapping means the
/// driver has not onboarded for payouts yet, which is a valid state.
#[async_trait]
pub trait DriverDirectory: Send + Sync {
    async fn lookup_gateway_account_id(&self, driver_id: &str)
        -> Result<Option<String>, PayError>;

    /// Records the mapping produced by Connect onboarding.
    async fn register(&self, driver_id: &str, gateway_account_id: &str) -> Result<(), PayError>;
}

#[derive(Default, Clone)]
pub struct InMemoryDriverDirectory {
    accounts: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryDriverDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DriverDirectory for InMemoryDriverDirectory {
    async fn lookup_gateway_account_id(
        &self,
        driver_id: &str,
    ) -> Result<Option<String>, PayError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(driver_id).cloned())
    }

    async fn register(&self, driver_id: &str, gateway_account_id: &str) -> Result<(), PayError> {
        let mut accounts = self.accounts.write().await;
        accounts.insert(driver_id.to_string(), gateway_account_id.to_string());
        Ok(())
    }
}
