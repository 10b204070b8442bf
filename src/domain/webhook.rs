use serde::{Deserialize, Serialize};

/// A verified gateway event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: Option<i64>,
    pub data: EventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Event types the platform subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    PaymentSucceeded,
    PaymentFailed,
    TransferCreated,
    TransferPaid,
    TransferFailed,
    ChargeRefunded,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    Unhandled(String),
}

impl WebhookEventKind {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => Self::PaymentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentFailed,
            "transfer.created" => Self::TransferCreated,
            "transfer.paid" => Self::TransferPaid,
            "transfer.failed" => Self::TransferFailed,
            "charge.refunded" => Self::ChargeRefunded,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            other => Self::Unhandled(other.to_string()),
        }
    }
}

impl WebhookEvent {
    pub fn kind(&self) -> WebhookEventKind {
        WebhookEventKind::parse(&self.event_type)
    }
}
