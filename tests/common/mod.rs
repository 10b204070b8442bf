#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use splitpay::application::orchestrator::PaymentOrchestrator;
use splitpay::domain::distribution::FeePolicy;
use splitpay::domain::ports::{
    CreateIntentRequest, CreateRefundRequest, CreateTransferRequest, GatewayPaymentIntent,
    GatewayRefund, GatewayResult, GatewayTransfer, PaymentGateway,
};
use splitpay::domain::webhook::WebhookEvent;
use splitpay::error::GatewayError;
use splitpay::infrastructure::in_memory::{DerivedContractorAccounts, InMemoryDistributionStore};
use splitpay::infrastructure::stripe::webhook;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Gateway operations the fake can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateIntent,
    Capture,
    Retrieve,
    Transfer,
    Refund,
}

#[derive(Default)]
struct State {
    intents: Vec<(String, CreateIntentRequest)>,
    captured: Vec<String>,
    transfers: Vec<CreateTransferRequest>,
    refunds: Vec<CreateRefundRequest>,
    failures: HashMap<Op, String>,
    /// Transfers already made, by idempotency key.
    transfers_by_key: HashMap<String, GatewayTransfer>,
    transfer_delay: Duration,
    lose_next_transfer_response: bool,
}

/// In-process payment gateway that records every request.
///
/// Transfers honour idempotency keys the way Stripe does: a repeated key
/// returns the original transfer and moves no money.
///
/// Webhook verification uses the real signature scheme, so tests sign payloads
/// with [`webhook::sign`].
#[derive(Default, Clone)]
pub struct FakeGateway {
    state: Arc<Mutex<State>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: Op, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op, message.to_string());
    }

    pub fn heal(&self, op: Op) {
        self.state.lock().unwrap().failures.remove(&op);
    }

    /// Holds every transfer for `delay` before it is made.
    pub fn set_transfer_delay(&self, delay: Duration) {
        self.state.lock().unwrap().transfer_delay = delay;
    }

    /// The next transfer goes through but its response never arrives.
    pub fn lose_next_transfer_response(&self) {
        self.state.lock().unwrap().lose_next_transfer_response = true;
    }

    pub fn intents(&self) -> Vec<CreateIntentRequest> {
        let state = self.state.lock().unwrap();
        state.intents.iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn captured(&self) -> Vec<String> {
        self.state.lock().unwrap().captured.clone()
    }

    pub fn transfers(&self) -> Vec<CreateTransferRequest> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn refunds(&self) -> Vec<CreateRefundRequest> {
        self.state.lock().unwrap().refunds.clone()
    }

    fn check(&self, op: Op) -> GatewayResult<()> {
        match self.state.lock().unwrap().failures.get(&op) {
            Some(message) => Err(GatewayError::Api {
                status: 402,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> GatewayResult<GatewayPaymentIntent> {
        self.check(Op::CreateIntent)?;
        let mut state = self.state.lock().unwrap();
        let id = format!("pi_fake_{}", state.intents.len() + 1);
        state.intents.push((id.clone(), request.clone()));
        Ok(GatewayPaymentIntent {
            id,
            amount: request.amount,
            currency: request.currency,
            status: "requires_payment_method".to_string(),
            metadata: request.metadata,
        })
    }

    async fn capture_payment_intent(&self, id: &str) -> GatewayResult<GatewayPaymentIntent> {
        self.check(Op::Capture)?;
        let mut state = self.state.lock().unwrap();
        let Some(request) = state
            .intents
            .iter()
            .find(|(intent_id, _)| intent_id == id)
            .map(|(_, r)| r.clone())
        else {
            return Err(GatewayError::Api {
                status: 404,
                message: format!("No such payment_intent: '{id}'"),
            });
        };
        state.captured.push(id.to_string());
        Ok(GatewayPaymentIntent {
            id: id.to_string(),
            amount: request.amount,
            currency: request.currency,
            status: "succeeded".to_string(),
            metadata: request.metadata,
        })
    }

    async fn retrieve_payment_intent(&self, id: &str) -> GatewayResult<serde_json::Value> {
        self.check(Op::Retrieve)?;
        let state = self.state.lock().unwrap();
        let status = if state.captured.iter().any(|c| c == id) {
            "succeeded"
        } else {
            "requires_capture"
        };
        match state.intents.iter().find(|(intent_id, _)| intent_id == id) {
            Some((_, request)) => Ok(serde_json::json!({
                "id": id,
                "object": "payment_intent",
                "amount": request.amount,
                "currency": request.currency,
                "status": status,
                "metadata": request.metadata,
            })),
            None => Err(GatewayError::Api {
                status: 404,
                message: format!("No such payment_intent: '{id}'"),
            }),
        }
    }

    async fn create_transfer(
        &self,
        request: CreateTransferRequest,
    ) -> GatewayResult<GatewayTransfer> {
        let delay = self.state.lock().unwrap().transfer_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check(Op::Transfer)?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = request
            .idempotency_key
            .as_ref()
            .and_then(|key| state.transfers_by_key.get(key))
        {
            return Ok(existing.clone());
        }
        state.transfers.push(request.clone());
        let transfer = GatewayTransfer {
            id: format!("tr_fake_{}", state.transfers.len()),
            amount: request.amount,
            currency: request.currency,
        };
        if let Some(key) = request.idempotency_key {
            state.transfers_by_key.insert(key, transfer.clone());
        }
        if std::mem::take(&mut state.lose_next_transfer_response) {
            return Err(GatewayError::Transport(
                "connection reset before response".to_string(),
            ));
        }
        Ok(transfer)
    }

    async fn create_refund(&self, request: CreateRefundRequest) -> GatewayResult<GatewayRefund> {
        self.check(Op::Refund)?;
        let mut state = self.state.lock().unwrap();
        let amount = match request.amount {
            Some(amount) => amount,
            None => state
                .intents
                .iter()
                .find(|(id, _)| *id == request.payment_intent)
                .map(|(_, r)| r.amount)
                .unwrap_or_default(),
        };
        state.refunds.push(request);
        Ok(GatewayRefund {
            id: format!("re_fake_{}", state.refunds.len()),
            amount,
            status: "succeeded".to_string(),
        })
    }

    fn construct_webhook_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> GatewayResult<WebhookEvent> {
        webhook::construct_event(payload, signature_header, secret, webhook::DEFAULT_TOLERANCE)
    }
}

/// An orchestrator over `gateway` with the default fee policy, plus a handle
/// on its distribution store.
pub fn orchestrator(gateway: &FakeGateway) -> (PaymentOrchestrator, InMemoryDistributionStore) {
    orchestrator_with_policy(gateway, FeePolicy::default())
}

pub fn orchestrator_with_policy(
    gateway: &FakeGateway,
    policy: FeePolicy,
) -> (PaymentOrchestrator, InMemoryDistributionStore) {
    let store = InMemoryDistributionStore::new();
    let orchestrator = PaymentOrchestrator::new(
        Box::new(gateway.clone()),
        Box::new(store.clone()),
        Box::new(DerivedContractorAccounts),
        policy,
    );
    (orchestrator, store)
}

/// Sum of the three parts of a split.
pub fn parts_sum(fee: Decimal, contractor: Decimal, holdback: Decimal) -> Decimal {
    fee + contractor + holdback
}
