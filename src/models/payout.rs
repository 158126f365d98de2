use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::round_half_up;

/// Share of the order total the driver receives.
pub const DRIVER_SHARE: Decimal = dec!(0.80);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Paid,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payout status: {other}")),
        }
    }
}

/// The driver's share of one completed order.
///
/// `amount` is fixed at creation; only `status`, `gateway_transfer_id` and
/// `paid_at` move afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverPayout {
    pub id: Uuid,
    pub driver_id: String,
    pub order_id: String,
    pub route_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: PayoutStatus,
    pub gateway_transfer_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DriverPayout {
    /// Builds a pending payout worth 80% of the order total, rounded
    /// half-up to 2 decimals.
    pub fn for_order(
        driver_id: impl Into<String>,
        order_id: impl Into<String>,
        order_total: Decimal,
        currency: impl Into<String>,
        route_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            driver_id: driver_id.into(),
            order_id: order_id.into(),
            route_id,
            amount: round_half_up(order_total * DRIVER_SHARE),
            currency: currency.into(),
            status: PayoutStatus::Pending,
            gateway_transfer_id: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_paid(&mut self, transfer_id: impl Into<String>) {
        self.status = PayoutStatus::Paid;
        self.gateway_transfer_id = Some(transfer_id.into());
        self.paid_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self) {
        self.status = PayoutStatus::Failed;
        self.updated_at = Utc::now();
    }

    pub fn reset_to_pending(&mut self) {
        self.status = PayoutStatus::Pending;
        self.updated_at = Utc::now();
    }
}
