pub mod health;
pub mod payments;
pub mod payouts;
pub mod webhook;

pub use health::*;
pub use payments::*;
pub use payouts::*;
pub use webhook::*;

use std::sync::Arc;
use std::time::Instant;

use crate::services::{PaymentService, PayoutService, WebhookService};

#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<PaymentService>,
    pub payouts: Arc<PayoutService>,
    pub webhooks: Arc<WebhookService>,
    pub webhook_configured: bool,
    pub started_at: Instant,
}
