//! Stripe REST adapter for the [`PaymentGateway`] port.

pub mod webhook;

use crate::config::Config;
use crate::domain::ports::{
    CreateIntentRequest, CreateRefundRequest, CreateTransferRequest, GatewayPaymentIntent,
    GatewayRefund, GatewayResult, GatewayTransfer, PaymentGateway,
};
use crate::domain::records::Metadata;
use crate::domain::webhook::WebhookEvent;
use crate::error::{GatewayError, PaymentError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_API_VERSION: &str = "2024-12-18.acacia";

type FormParams = Vec<(String, String)>;

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Talks to the Stripe API with form-encoded requests and bearer auth.
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    api_version: String,
    webhook_tolerance: Duration,
}

impl StripeGateway {
    /// Fails when `secret_key` is empty; the gateway is unusable without it.
    pub fn new(secret_key: impl Into<String>) -> Result<Self> {
        let secret_key = secret_key.into();
        if secret_key.trim().is_empty() {
            return Err(PaymentError::ConfigError(
                "STRIPE_SECRET_KEY environment variable is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            secret_key,
            api_version: DEFAULT_API_VERSION.to_string(),
            webhook_tolerance: webhook::DEFAULT_TOLERANCE,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.secret_key.clone())?
            .with_api_base(&config.api_base)
            .with_api_version(&config.api_version)
            .with_webhook_tolerance(config.webhook_tolerance))
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.to_string();
        self
    }

    pub fn with_webhook_tolerance(mut self, tolerance: Duration) -> Self {
        self.webhook_tolerance = tolerance;
        self
    }

    /// `<api base>/v1/<segments...>`, each segment percent-encoded so that an
    /// id can never address another resource.
    fn url(&self, segments: &[&str]) -> GatewayResult<reqwest::Url> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(GatewayError::InvalidRequest(format!(
                "Invalid object id: {bad:?}"
            )));
        }
        let invalid =
            || GatewayError::Transport(format!("Invalid Stripe API base URL: {}", self.api_base));
        let mut url = reqwest::Url::parse(&self.api_base).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &FormParams,
        idempotency_key: Option<&str>,
    ) -> GatewayResult<T> {
        let mut request = self
            .client
            .post(self.url(segments)?)
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", &self.api_version)
            .form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        decode(request.send().await?).await
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> GatewayResult<T> {
        let response = self
            .client
            .get(self.url(segments)?)
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", &self.api_version)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> GatewayResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => envelope
            .error
            .message
            .or(envelope.error.kind)
            .unwrap_or_else(|| format!("Stripe returned HTTP {}", status.as_u16())),
        Err(_) => format!("Stripe returned HTTP {}", status.as_u16()),
    };
    Err(GatewayError::Api {
        status: status.as_u16(),
        message,
    })
}

fn push_metadata(params: &mut FormParams, metadata: &Metadata) {
    for (key, value) in metadata {
        params.push((format!("metadata[{key}]"), value.clone()));
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> GatewayResult<GatewayPaymentIntent> {
        let mut params: FormParams = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency),
            (
                "capture_method".to_string(),
                if request.manual_capture { "manual" } else { "automatic" }.to_string(),
            ),
            (
                "automatic_payment_methods[enabled]".to_string(),
                request.automatic_payment_methods.to_string(),
            ),
        ];
        push_metadata(&mut params, &request.metadata);
        self.post_form(&["payment_intents"], &params, None).await
    }

    async fn capture_payment_intent(&self, id: &str) -> GatewayResult<GatewayPaymentIntent> {
        self.post_form(&["payment_intents", id, "capture"], &Vec::new(), None)
            .await
    }

    async fn retrieve_payment_intent(&self, id: &str) -> GatewayResult<serde_json::Value> {
        self.get(&["payment_intents", id]).await
    }

    async fn create_transfer(
        &self,
        request: CreateTransferRequest,
    ) -> GatewayResult<GatewayTransfer> {
        let mut params: FormParams = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency),
            ("destination".to_string(), request.destination),
        ];
        push_metadata(&mut params, &request.metadata);
        self.post_form(&["transfers"], &params, request.idempotency_key.as_deref())
            .await
    }

    async fn create_refund(&self, request: CreateRefundRequest) -> GatewayResult<GatewayRefund> {
        let mut params: FormParams = vec![
            ("payment_intent".to_string(), request.payment_intent),
            ("reason".to_string(), request.reason.as_str().to_string()),
        ];
        if let Some(amount) = request.amount {
            params.push(("amount".to_string(), amount.to_string()));
        }
        self.post_form(&["refunds"], &params, None).await
    }

    fn construct_webhook_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> GatewayResult<WebhookEvent> {
        webhook::construct_event(payload, signature_header, secret, self.webhook_tolerance)
    }
}
