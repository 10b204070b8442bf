use super::distribution::DistributionResult;
use super::money::Currency;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Open string-keyed metadata attached to gateway objects.
pub type Metadata = BTreeMap<String, String>;

const ID_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Generates a local record id of the form `<prefix>_<unix millis>_<9 base36 chars>`.
pub fn generate_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_SUFFIX_ALPHABET[rng.gen_range(0..ID_SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), suffix)
}

/// Rejects ids that are not plain gateway object ids (`pi_3Mtw...`).
///
/// Ids end up in gateway URL paths, so separators and dot segments must never
/// get through.
pub fn ensure_object_id(kind: &str, id: &str) -> Result<()> {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(PaymentError::ValidationError(format!("Invalid {kind} ID: {id}")))
    }
}

/// A customer charge authorization, projected from gateway state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRecord {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: Currency,
    pub status: String,
    pub customer_id: String,
    pub project_id: String,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DistributionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DistributionStatus {
    /// `completed` is terminal; `failed` may only move on to `completed`
    /// through a successful holdback release retry.
    pub fn can_transition_to(self, next: DistributionStatus) -> bool {
        use DistributionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Completed)
        )
    }
}

/// One distribution event for a project payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDistributionRecord {
    pub id: String,
    pub project_id: String,
    pub customer_payment_id: String,
    pub contractor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contractor_payout_id: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub platform_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub contractor_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub holdback_amount: Decimal,
    pub status: DistributionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentDistributionRecord {
    /// Creates a `pending` record from a computed split.
    pub fn new(
        project_id: &str,
        customer_payment_id: &str,
        contractor_id: &str,
        total_amount: Decimal,
        split: &DistributionResult,
    ) -> Self {
        Self {
            id: generate_id("pd"),
            project_id: project_id.to_string(),
            customer_payment_id: customer_payment_id.to_string(),
            contractor_id: contractor_id.to_string(),
            contractor_payout_id: None,
            total_amount,
            platform_fee: split.platform_fee,
            contractor_amount: split.contractor_amount,
            holdback_amount: split.holdback_amount,
            status: DistributionStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Moves the record to `next`, returning `false` (and leaving the record
    /// untouched) for transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: DistributionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next == DistributionStatus::Completed {
            self.completed_at = Some(Utc::now());
        }
        true
    }
}

/// Payouts stay `processing` here; settlement is reported by the gateway's
/// transfer webhooks.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Processing,
}

/// A transfer of funds to a contractor's connected account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractorPayoutRecord {
    pub id: String,
    pub contractor_id: String,
    pub project_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: Currency,
    pub status: PayoutStatus,
    pub gateway_transfer_id: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    Duplicate,
    Fraudulent,
    #[default]
    RequestedByCustomer,
}

impl RefundReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundReason::Duplicate => "duplicate",
            RefundReason::Fraudulent => "fraudulent",
            RefundReason::RequestedByCustomer => "requested_by_customer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundSummary {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: String,
}

/// Aggregate figures over the distributions created in a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformAnalytics {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    pub total_payments: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_payouts: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_platform_fee: Decimal,
}
