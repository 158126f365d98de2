pub mod drivers;
pub mod ledger;
pub mod payments;
pub mod payouts;
pub mod security;
pub mod webhook;

pub use drivers::{DriverDirectory, InMemoryDriverDirectory};
pub use ledger::{InMemoryPayoutStore, InMemoryTransactionStore, PayoutStore, TransactionStore};
pub use payments::{ChargeCreated, ChargeState, CreateCharge, PaymentService};
pub use payouts::PayoutService;
pub use security::SecurityGuard;
pub use webhook::WebhookService;
