use super::records::{Metadata, PaymentDistributionRecord, RefundReason};
use super::webhook::WebhookEvent;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Amounts are in minor units; currencies are lower-case ISO codes.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIntentRequest {
    pub amount: i64,
    pub currency: String,
    pub metadata: Metadata,
    /// Authorize only; funds are taken by a later capture.
    pub manual_capture: bool,
    pub automatic_payment_methods: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTransferRequest {
    pub amount: i64,
    pub currency: String,
    pub destination: String,
    pub metadata: Metadata,
    /// Replaying a request with the same key returns the original transfer
    /// instead of moving money again.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayTransfer {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRefundRequest {
    pub payment_intent: String,
    /// `None` requests a full refund.
    pub amount: Option<i64>,
    pub reason: RefundReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub amount: i64,
    pub status: String,
}

/// The external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> GatewayResult<GatewayPaymentIntent>;
    async fn capture_payment_intent(&self, id: &str) -> GatewayResult<GatewayPaymentIntent>;
    /// Raw gateway representation, passed through untouched.
    async fn retrieve_payment_intent(&self, id: &str) -> GatewayResult<serde_json::Value>;
    async fn create_transfer(&self, request: CreateTransferRequest)
    -> GatewayResult<GatewayTransfer>;
    async fn create_refund(&self, request: CreateRefundRequest) -> GatewayResult<GatewayRefund>;
    /// Verifies the signature over `payload` and parses the event. Must reject
    /// on any verification failure.
    fn construct_webhook_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> GatewayResult<WebhookEvent>;
}

/// Persistence for distribution records.
#[async_trait]
pub trait DistributionStore: Send + Sync {
    async fn store(&self, record: PaymentDistributionRecord) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<PaymentDistributionRecord>>;
    async fn by_project(&self, project_id: &str) -> Result<Vec<PaymentDistributionRecord>>;
    async fn all(&self) -> Result<Vec<PaymentDistributionRecord>>;
}

/// Maps contractors to their connected gateway accounts.
#[async_trait]
pub trait ContractorAccounts: Send + Sync {
    async fn destination_for(&self, contractor_id: &str) -> Result<Option<String>>;
}

pub type GatewayBox = Box<dyn PaymentGateway>;
pub type DistributionStoreBox = Box<dyn DistributionStore>;
pub type ContractorAccountsBox = Box<dyn ContractorAccounts>;
