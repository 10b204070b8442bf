use crate::domain::distribution::{Complexity, DistributionResult, FeePolicy};
use crate::domain::money::{Currency, from_minor_units, to_minor_units};
use crate::domain::ports::{
    ContractorAccountsBox, CreateIntentRequest, CreateRefundRequest,
    CreateTransferRequest, DistributionStoreBox, GatewayBox,
};
use crate::domain::records::{
    ContractorPayoutRecord, DistributionStatus, Metadata, PaymentDistributionRecord,
    PaymentIntentRecord, PayoutStatus, PlatformAnalytics, RefundReason, RefundSummary,
    ensure_object_id, generate_id,
};
use crate::domain::webhook::WebhookEvent;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, instrument, warn};

/// Sequences the project payment lifecycle against the payment gateway.
///
/// `create intent → capture → distribute (initial payout) → release holdback`,
/// plus refunds and webhook verification. Amounts are major units throughout;
/// conversion to the gateway's minor units happens here and nowhere else.
///
/// Every gateway failure is wrapped in an operation-specific [`PaymentError`]
/// and returned. Nothing is retried. Transfers carry an idempotency key
/// derived from the distribution id, so a caller retrying after a lost
/// response is paid once.
pub struct PaymentOrchestrator {
    gateway: GatewayBox,
    distributions: DistributionStoreBox,
    accounts: ContractorAccountsBox,
    fee_policy: FeePolicy,
    payout_currency: Currency,
    /// One lock per distribution with a release in flight.
    release_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PaymentOrchestrator {
    /// Creates a new `PaymentOrchestrator` paying contractors in USD.
    ///
    /// # Arguments
    ///
    /// * `gateway` - The external payment processor.
    /// * `distributions` - Where distribution records (and their holdbacks) are kept.
    /// * `accounts` - Resolves contractors to connected gateway accounts.
    /// * `fee_policy` - Fee rates, holdback rate and minimum fee.
    pub fn new(
        gateway: GatewayBox,
        distributions: DistributionStoreBox,
        accounts: ContractorAccountsBox,
        fee_policy: FeePolicy,
    ) -> Self {
        Self {
            gateway,
            distributions,
            accounts,
            fee_policy,
            payout_currency: Currency::usd(),
            release_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_payout_currency(mut self, currency: Currency) -> Self {
        self.payout_currency = currency;
        self
    }

    pub fn fee_policy(&self) -> &FeePolicy {
        &self.fee_policy
    }

    pub fn calculate_payment_distribution(
        &self,
        total_amount: Decimal,
        complexity: Complexity,
    ) -> DistributionResult {
        self.fee_policy.calculate(total_amount, complexity)
    }

    /// Authorizes (but does not capture) a customer payment.
    #[instrument(skip(self, metadata))]
    pub async fn create_customer_payment_intent(
        &self,
        amount: Decimal,
        currency: &Currency,
        customer_id: &str,
        project_id: &str,
        metadata: Metadata,
    ) -> Result<PaymentIntentRecord> {
        let mut gateway_metadata = Metadata::from([
            ("customerId".to_string(), customer_id.to_string()),
            ("projectId".to_string(), project_id.to_string()),
            ("type".to_string(), "customer_payment".to_string()),
        ]);
        gateway_metadata.extend(metadata.clone());

        let request = CreateIntentRequest {
            amount: to_minor_units(amount)?,
            currency: currency.gateway_code(),
            metadata: gateway_metadata,
            manual_capture: true,
            automatic_payment_methods: true,
        };

        let intent = self
            .gateway
            .create_payment_intent(request)
            .await
            .map_err(|e| {
                error!(error = %e, "Error creating customer payment intent");
                PaymentError::PaymentIntentCreationError(e.to_string())
            })?;

        let mut record_metadata = metadata;
        record_metadata.insert("gatewayPaymentIntentId".to_string(), intent.id.clone());

        info!(payment_intent = %intent.id, status = %intent.status, "Payment intent created");
        Ok(PaymentIntentRecord {
            id: intent.id,
            amount,
            currency: currency.clone(),
            status: intent.status,
            customer_id: customer_id.to_string(),
            project_id: project_id.to_string(),
            metadata: record_metadata,
        })
    }

    /// Captures a previously authorized payment.
    #[instrument(skip(self))]
    pub async fn capture_customer_payment(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntentRecord> {
        ensure_object_id("payment intent", payment_intent_id)?;
        let intent = self
            .gateway
            .capture_payment_intent(payment_intent_id)
            .await
            .map_err(|e| {
                error!(error = %e, "Error capturing customer payment");
                PaymentError::PaymentCaptureError(e.to_string())
            })?;

        let currency = Currency::new(&intent.currency)
            .map_err(|e| PaymentError::PaymentCaptureError(e.to_string()))?;

        info!(payment_intent = %intent.id, status = %intent.status, "Payment captured");
        Ok(PaymentIntentRecord {
            id: intent.id,
            amount: from_minor_units(intent.amount),
            currency,
            status: intent.status,
            customer_id: intent.metadata.get("customerId").cloned().unwrap_or_default(),
            project_id: intent.metadata.get("projectId").cloned().unwrap_or_default(),
            metadata: intent.metadata,
        })
    }

    /// Splits a captured payment and pays the contractor's immediate share.
    ///
    /// The distribution is persisted only once the initial payout exists; on
    /// payout failure nothing is stored or returned.
    #[instrument(skip(self))]
    pub async fn process_payment_distribution(
        &self,
        project_id: &str,
        customer_payment_id: &str,
        total_amount: Decimal,
        contractor_id: &str,
        complexity: Complexity,
    ) -> Result<PaymentDistributionRecord> {
        let split = self.fee_policy.calculate(total_amount, complexity);
        if split.net_contractor_amount <= Decimal::ZERO {
            return Err(PaymentError::ValidationError(format!(
                "Total amount {total_amount} does not cover the platform fee and holdback"
            )));
        }

        let mut record = PaymentDistributionRecord::new(
            project_id,
            customer_payment_id,
            contractor_id,
            total_amount,
            &split,
        );

        let metadata = Metadata::from([
            ("type".to_string(), "initial_payout".to_string()),
            ("paymentDistributionId".to_string(), record.id.clone()),
        ]);
        let payout = self
            .transfer_to_contractor(
                contractor_id,
                project_id,
                split.net_contractor_amount,
                &self.payout_currency,
                metadata,
                Some(format!("initial_payout:{}", record.id)),
            )
            .await
            .map_err(|e| {
                error!(distribution = %record.id, error = %e, "Error processing payment distribution");
                PaymentError::DistributionProcessingError(e.to_string())
            })?;

        record.contractor_payout_id = Some(payout.id);
        record.transition(DistributionStatus::Processing);

        self.distributions
            .store(record.clone())
            .await
            .map_err(|e| {
                error!(distribution = %record.id, error = %e, "Payout sent but distribution could not be stored");
                PaymentError::DistributionProcessingError(e.to_string())
            })?;

        info!(
            distribution = %record.id,
            platform_fee = %record.platform_fee,
            holdback = %record.holdback_amount,
            "Payment distribution processing"
        );
        Ok(record)
    }

    /// Transfers `amount` to the contractor's connected account.
    #[instrument(skip(self, metadata))]
    pub async fn create_contractor_payout(
        &self,
        contractor_id: &str,
        project_id: &str,
        amount: Decimal,
        currency: &Currency,
        metadata: Metadata,
    ) -> Result<ContractorPayoutRecord> {
        self.transfer_to_contractor(contractor_id, project_id, amount, currency, metadata, None)
            .await
    }

    async fn transfer_to_contractor(
        &self,
        contractor_id: &str,
        project_id: &str,
        amount: Decimal,
        currency: &Currency,
        metadata: Metadata,
        idempotency_key: Option<String>,
    ) -> Result<ContractorPayoutRecord> {
        let destination = self
            .accounts
            .destination_for(contractor_id)
            .await
            .map_err(|e| PaymentError::ContractorPayoutError(e.to_string()))?
            .ok_or_else(|| {
                PaymentError::ContractorPayoutError(format!(
                    "No connected account for contractor {contractor_id}"
                ))
            })?;

        let mut gateway_metadata = Metadata::from([
            ("contractorId".to_string(), contractor_id.to_string()),
            ("projectId".to_string(), project_id.to_string()),
            ("type".to_string(), "contractor_payout".to_string()),
        ]);
        gateway_metadata.extend(metadata.clone());

        let request = CreateTransferRequest {
            amount: to_minor_units(amount)?,
            currency: currency.gateway_code(),
            destination,
            metadata: gateway_metadata,
            idempotency_key,
        };

        let transfer = self.gateway.create_transfer(request).await.map_err(|e| {
            error!(error = %e, "Error creating contractor payout");
            PaymentError::ContractorPayoutError(e.to_string())
        })?;

        let mut record_metadata = metadata;
        record_metadata.insert("gatewayTransferId".to_string(), transfer.id.clone());

        info!(transfer = %transfer.id, %amount, "Contractor payout created");
        Ok(ContractorPayoutRecord {
            id: generate_id("cp"),
            contractor_id: contractor_id.to_string(),
            project_id: project_id.to_string(),
            amount,
            currency: currency.clone(),
            status: PayoutStatus::Processing,
            gateway_transfer_id: transfer.id,
            metadata: record_metadata,
            created_at: Utc::now(),
            completed_at: None,
        })
    }

    /// Pays out the holdback withheld by a distribution and completes it.
    ///
    /// A gateway failure marks the distribution `failed`; releasing it again
    /// later is allowed. Concurrent releases of one distribution run one at a
    /// time, so only the first pays.
    #[instrument(skip(self))]
    pub async fn release_holdback(
        &self,
        distribution_id: &str,
        project_id: &str,
        contractor_id: &str,
    ) -> Result<ContractorPayoutRecord> {
        let guard = self.lock_release(distribution_id).await;
        let result = self
            .release_locked(distribution_id, project_id, contractor_id)
            .await;
        drop(guard);
        self.unlock_release(distribution_id).await;
        result
    }

    async fn lock_release(&self, distribution_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .release_locks
            .lock()
            .await
            .entry(distribution_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drops the lock entry once no other release is holding or waiting on it.
    async fn unlock_release(&self, distribution_id: &str) {
        let mut locks = self.release_locks.lock().await;
        if locks
            .get(distribution_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(distribution_id);
        }
    }

    async fn release_locked(
        &self,
        distribution_id: &str,
        project_id: &str,
        contractor_id: &str,
    ) -> Result<ContractorPayoutRecord> {
        let mut record = self
            .distributions
            .get(distribution_id)
            .await?
            .ok_or_else(|| PaymentError::DistributionNotFound(distribution_id.to_string()))?;

        if record.project_id != project_id || record.contractor_id != contractor_id {
            return Err(PaymentError::ValidationError(format!(
                "Distribution {distribution_id} does not belong to project {project_id} and contractor {contractor_id}"
            )));
        }

        if record.holdback_amount <= Decimal::ZERO
            || !record.status.can_transition_to(DistributionStatus::Completed)
        {
            warn!(status = ?record.status, "No holdback available to release");
            return Err(PaymentError::NoHoldbackAvailableError);
        }

        let metadata = Metadata::from([
            ("type".to_string(), "holdback_release".to_string()),
            ("paymentDistributionId".to_string(), record.id.clone()),
        ]);
        let result = self
            .transfer_to_contractor(
                contractor_id,
                project_id,
                record.holdback_amount,
                &self.payout_currency,
                metadata,
                Some(format!("holdback_release:{}", record.id)),
            )
            .await;

        match result {
            Ok(payout) => {
                record.transition(DistributionStatus::Completed);
                self.distributions.store(record).await?;
                info!(payout = %payout.id, "Holdback released");
                Ok(payout)
            }
            Err(e) => {
                error!(error = %e, "Error releasing holdback");
                if record.transition(DistributionStatus::Failed)
                    && let Err(store_err) = self.distributions.store(record).await
                {
                    error!(error = %store_err, "Failed to mark distribution as failed");
                }
                Err(e)
            }
        }
    }

    /// Refunds a customer payment; `amount` of `None` refunds it in full.
    #[instrument(skip(self))]
    pub async fn refund_customer_payment(
        &self,
        payment_intent_id: &str,
        amount: Option<Decimal>,
        reason: RefundReason,
    ) -> Result<RefundSummary> {
        let request = CreateRefundRequest {
            payment_intent: payment_intent_id.to_string(),
            amount: amount.map(to_minor_units).transpose()?,
            reason,
        };

        let refund = self.gateway.create_refund(request).await.map_err(|e| {
            error!(error = %e, "Error refunding customer payment");
            PaymentError::RefundError(e.to_string())
        })?;

        info!(refund = %refund.id, status = %refund.status, "Refund created");
        Ok(RefundSummary {
            id: refund.id,
            amount: from_minor_units(refund.amount),
            status: refund.status,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<serde_json::Value> {
        ensure_object_id("payment intent", payment_intent_id)?;
        self.gateway
            .retrieve_payment_intent(payment_intent_id)
            .await
            .map_err(|e| {
                error!(error = %e, "Error retrieving payment intent");
                PaymentError::PaymentIntentRetrievalError(e.to_string())
            })
    }

    /// Verifies a webhook delivery. Never returns an event whose signature
    /// did not verify.
    pub fn verify_webhook_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        webhook_secret: &str,
    ) -> Result<WebhookEvent> {
        self.gateway
            .construct_webhook_event(payload, signature_header, webhook_secret)
            .map_err(|e| {
                warn!(error = %e, "Webhook signature verification failed");
                PaymentError::WebhookVerificationError(e.to_string())
            })
    }

    pub async fn get_distribution(&self, distribution_id: &str) -> Result<PaymentDistributionRecord> {
        self.distributions
            .get(distribution_id)
            .await?
            .ok_or_else(|| PaymentError::DistributionNotFound(distribution_id.to_string()))
    }

    pub async fn list_distributions(&self, project_id: &str) -> Result<Vec<PaymentDistributionRecord>> {
        self.distributions.by_project(project_id).await
    }

    /// Aggregates the distributions created within `[start, end]`.
    pub async fn platform_analytics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PlatformAnalytics> {
        let records: Vec<_> = self
            .distributions
            .all()
            .await?
            .into_iter()
            .filter(|r| r.created_at >= start && r.created_at <= end)
            .collect();

        let total_payments = records.len() as u64;
        let total_revenue: Decimal = records.iter().map(|r| r.platform_fee).sum();
        let total_payouts: Decimal = records
            .iter()
            .map(|r| match r.status {
                DistributionStatus::Completed => r.contractor_amount + r.holdback_amount,
                DistributionStatus::Pending => Decimal::ZERO,
                _ => r.contractor_amount,
            })
            .sum();
        let average_platform_fee = if total_payments == 0 {
            Decimal::ZERO
        } else {
            (total_revenue / Decimal::from(total_payments)).round_dp(2)
        };

        Ok(PlatformAnalytics {
            total_revenue: total_revenue.normalize(),
            total_payments,
            total_payouts: total_payouts.normalize(),
            average_platform_fee: average_platform_fee.normalize(),
        })
    }
}
