//! HTTP request handlers
//!
//! Each handler validates the request body, calls the orchestrator and wraps
//! the result as `{"success": true, "data": ...}`. Validation failures are 400s;
//! orchestrator failures are mapped by [`ApiError::from_payment_error`].

use super::AppState;
use super::error::ApiError;
use crate::domain::distribution::Complexity;
use crate::domain::money::{Amount, Currency};
use crate::domain::records::{
    ContractorPayoutRecord, Metadata, PaymentDistributionRecord, PaymentIntentRecord,
    PlatformAnalytics, RefundReason, RefundSummary,
};
use crate::domain::webhook::{WebhookEvent, WebhookEventKind};
use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data,
    }))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| {
            ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
        })
}

/// Present and non-blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentBody {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub customer_id: Option<String>,
    pub project_id: Option<String>,
    pub metadata: Option<Metadata>,
}

/// `POST /payment-intent`
pub async fn create_payment_intent(
    State(state): State<AppState>,
    payload: Result<Json<CreatePaymentIntentBody>, JsonRejection>,
) -> ApiResult<PaymentIntentRecord> {
    let req = body(payload)?;

    let (Some(amount), Some(currency), Some(customer_id), Some(project_id)) = (
        req.amount.filter(|a| !a.is_zero()),
        present(&req.currency),
        present(&req.customer_id),
        present(&req.project_id),
    ) else {
        return Err(ApiError::bad_request(
            "Missing required fields: amount, currency, customerId, projectId",
        ));
    };

    let amount = Amount::new(amount).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let currency = Currency::new(currency)
        .ok()
        .filter(Currency::is_supported)
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported currency: {currency}")))?;

    let intent = state
        .orchestrator
        .create_customer_payment_intent(
            amount.value(),
            &currency,
            customer_id,
            project_id,
            req.metadata.unwrap_or_default(),
        )
        .await
        .map_err(|e| ApiError::from_payment_error("Failed to create payment intent", e))?;

    ok(intent)
}

/// `GET /payment-intent?id=`
pub async fn get_payment_intent(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<serde_json::Value> {
    let Some(id) = present(&params.get("id").cloned()).map(str::to_string) else {
        return Err(ApiError::bad_request("Payment intent ID is required"));
    };

    let intent = state
        .orchestrator
        .get_payment_intent(&id)
        .await
        .map_err(|e| ApiError::from_payment_error("Failed to retrieve payment intent", e))?;

    ok(intent)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePaymentBody {
    pub payment_intent_id: Option<String>,
}

/// `POST /capture-payment`
pub async fn capture_payment(
    State(state): State<AppState>,
    payload: Result<Json<CapturePaymentBody>, JsonRejection>,
) -> ApiResult<PaymentIntentRecord> {
    let req = body(payload)?;
    let Some(id) = present(&req.payment_intent_id) else {
        return Err(ApiError::bad_request("Payment intent ID is required"));
    };

    let captured = state
        .orchestrator
        .capture_customer_payment(id)
        .await
        .map_err(|e| ApiError::from_payment_error("Failed to capture payment", e))?;

    ok(captured)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDistributionBody {
    pub project_id: Option<String>,
    pub customer_payment_id: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub total_amount: Option<Decimal>,
    pub contractor_id: Option<String>,
    pub project_complexity: Option<String>,
}

/// `POST /payment-distribution`
pub async fn create_payment_distribution(
    State(state): State<AppState>,
    payload: Result<Json<PaymentDistributionBody>, JsonRejection>,
) -> ApiResult<PaymentDistributionRecord> {
    let req = body(payload)?;

    let (Some(project_id), Some(customer_payment_id), Some(total_amount), Some(contractor_id)) = (
        present(&req.project_id),
        present(&req.customer_payment_id),
        req.total_amount.filter(|a| !a.is_zero()),
        present(&req.contractor_id),
    ) else {
        return Err(ApiError::bad_request(
            "Missing required fields: projectId, customerPaymentId, totalAmount, contractorId",
        ));
    };

    if total_amount <= Decimal::ZERO {
        return Err(ApiError::bad_request("Total amount must be greater than 0"));
    }

    let complexity = match present(&req.project_complexity) {
        Some(value) => value
            .parse::<Complexity>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
        None => Complexity::default(),
    };

    let distribution = state
        .orchestrator
        .process_payment_distribution(
            project_id,
            customer_payment_id,
            total_amount,
            contractor_id,
            complexity,
        )
        .await
        .map_err(|e| ApiError::from_payment_error("Failed to process payment distribution", e))?;

    ok(distribution)
}

/// `GET /payment-distribution?projectId=`
pub async fn list_payment_distributions(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<PaymentDistributionRecord>> {
    let Some(project_id) = present(&params.get("projectId").cloned()).map(str::to_string) else {
        return Err(ApiError::bad_request("Project ID is required"));
    };

    let distributions = state
        .orchestrator
        .list_distributions(&project_id)
        .await
        .map_err(|e| ApiError::from_payment_error("Failed to retrieve payment distributions", e))?;

    ok(distributions)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseHoldbackBody {
    pub distribution_id: Option<String>,
    pub project_id: Option<String>,
    pub contractor_id: Option<String>,
}

/// `POST /release-holdback`
pub async fn release_holdback(
    State(state): State<AppState>,
    payload: Result<Json<ReleaseHoldbackBody>, JsonRejection>,
) -> ApiResult<ContractorPayoutRecord> {
    let req = body(payload)?;
    let (Some(distribution_id), Some(project_id), Some(contractor_id)) = (
        present(&req.distribution_id),
        present(&req.project_id),
        present(&req.contractor_id),
    ) else {
        return Err(ApiError::bad_request(
            "Missing required fields: distributionId, projectId, contractorId",
        ));
    };

    let payout = state
        .orchestrator
        .release_holdback(distribution_id, project_id, contractor_id)
        .await
        .map_err(|e| ApiError::from_payment_error("Failed to release holdback", e))?;

    ok(payout)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundBody {
    pub payment_intent_id: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    pub reason: Option<RefundReason>,
}

/// `POST /refund`
pub async fn refund_payment(
    State(state): State<AppState>,
    payload: Result<Json<RefundBody>, JsonRejection>,
) -> ApiResult<RefundSummary> {
    let req = body(payload)?;
    let Some(payment_intent_id) = present(&req.payment_intent_id) else {
        return Err(ApiError::bad_request("Payment intent ID is required"));
    };
    if req.amount.is_some_and(|a| a <= Decimal::ZERO) {
        return Err(ApiError::bad_request("Refund amount must be greater than 0"));
    }

    let refund = state
        .orchestrator
        .refund_customer_payment(payment_intent_id, req.amount, req.reason.unwrap_or_default())
        .await
        .map_err(|e| ApiError::from_payment_error("Failed to create refund", e))?;

    ok(refund)
}

fn parse_time(params: &HashMap<String, String>, key: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
    match present(&params.get(key).cloned()) {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| ApiError::bad_request(format!("Invalid {key} time, expected RFC 3339: {raw}"))),
        None => Ok(None),
    }
}

/// `GET /analytics?start=&end=`
///
/// Both bounds are optional RFC 3339 timestamps; the window defaults to
/// everything up to now.
pub async fn platform_analytics(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<PlatformAnalytics> {
    let start = parse_time(&params, "start")?.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = parse_time(&params, "end")?.unwrap_or_else(Utc::now);

    let analytics = state
        .orchestrator
        .platform_analytics(start, end)
        .await
        .map_err(|e| ApiError::from_payment_error("Failed to get platform analytics", e))?;

    ok(analytics)
}

fn log_event(event: &WebhookEvent) {
    let object_id = event.data.object.get("id").and_then(|v| v.as_str()).unwrap_or("");
    match event.kind() {
        WebhookEventKind::PaymentSucceeded => info!(object_id, "Payment succeeded"),
        WebhookEventKind::PaymentFailed => info!(object_id, "Payment failed"),
        WebhookEventKind::TransferCreated => info!(object_id, "Transfer created"),
        WebhookEventKind::TransferPaid => info!(object_id, "Transfer paid"),
        WebhookEventKind::TransferFailed => info!(object_id, "Transfer failed"),
        WebhookEventKind::ChargeRefunded => info!(object_id, "Charge refunded"),
        WebhookEventKind::InvoicePaymentSucceeded => info!(object_id, "Invoice payment succeeded"),
        WebhookEventKind::InvoicePaymentFailed => info!(object_id, "Invoice payment failed"),
        WebhookEventKind::Unhandled(event_type) => info!(%event_type, "Unhandled event type"),
    }
}

/// `POST /webhook`
///
/// The raw body is verified against the `stripe-signature` header before it is
/// parsed. Events are logged, not acted upon.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    else {
        return Err(ApiError::bad_request("Missing Stripe signature"));
    };

    let Some(secret) = state.webhook_secret.resolve() else {
        error!("Webhook secret is not configured");
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook secret not configured",
            None,
        ));
    };

    let event = state
        .orchestrator
        .verify_webhook_event(&payload, signature, &secret)
        .map_err(|e| ApiError::from_payment_error("Webhook processing failed", e))?;

    log_event(&event);
    Ok(Json(serde_json::json!({ "received": true })))
}
