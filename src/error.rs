use thiserror::Error;

/// Failure reported by a payment gateway adapter.
///
/// `Display` yields the gateway's own message so that the orchestrator can wrap
/// it verbatim (e.g. `Failed to capture payment: <message>`).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Decode(String),
    #[error("{0}")]
    SignatureVerification(String),
    /// Rejected before anything was sent.
    #[error("{0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Failed to create payment intent: {0}")]
    PaymentIntentCreationError(String),
    #[error("Failed to capture payment: {0}")]
    PaymentCaptureError(String),
    #[error("Failed to process payment distribution: {0}")]
    DistributionProcessingError(String),
    #[error("Failed to create contractor payout: {0}")]
    ContractorPayoutError(String),
    #[error("Failed to create refund: {0}")]
    RefundError(String),
    #[error("Failed to retrieve payment intent: {0}")]
    PaymentIntentRetrievalError(String),
    #[error("Webhook signature verification failed: {0}")]
    WebhookVerificationError(String),
    #[error("No holdback amount available to release")]
    NoHoldbackAvailableError,
    #[error("Payment distribution not found: {0}")]
    DistributionNotFound(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        PaymentError::InternalError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
