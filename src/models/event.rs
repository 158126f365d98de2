use serde::{Deserialize, Serialize};

use super::transaction::ChargeStatus;

/// Webhook event envelope pushed by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: GatewayEventData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEventData {
    pub object: ChargeObject,
}

/// The charge embedded in a webhook event. Only the fields this service
/// folds into the ledger are modeled; everything else is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeObject {
    pub id: String,
    pub status: ChargeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_error: Option<LastPaymentError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastPaymentError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_succeeded_event() {
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": "charge.succeeded",
            "created": 1700000000,
            "data": {
                "object": {
                    "id": "ch_1",
                    "status": "succeeded",
                    "amount": 2500,
                    "currency": "usd"
                }
            }
        });

        let event: GatewayEvent = serde_json::from_value(payload).unwrap();
        assert_eq!(event.event_type, "charge.succeeded");
        assert_eq!(event.data.object.id, "ch_1");
        assert_eq!(event.data.object.status, ChargeStatus::Succeeded);
    }

    #[test]
    fn parses_failure_payload_with_last_error() {
        let payload = serde_json::json!({
            "id": "evt_2",
            "type": "charge.payment_failed",
            "data": {
                "object": {
                    "id": "ch_2",
                    "status": "requires_payment_method",
                    "last_payment_error": { "code": "card_declined", "message": "Card declined" }
                }
            }
        });

        let event: GatewayEvent = serde_json::from_value(payload).unwrap();
        let error = event.data.object.last_payment_error.unwrap();
        assert_eq!(error.message.as_deref(), Some("Card declined"));
        assert_eq!(event.data.object.status, ChargeStatus::RequiresPaymentMethod);
    }
}
