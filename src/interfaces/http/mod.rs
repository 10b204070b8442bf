//! JSON-over-HTTP surface of the orchestrator.

pub mod error;
pub mod handlers;

use crate::application::orchestrator::PaymentOrchestrator;
use crate::config::WebhookSecret;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub webhook_secret: WebhookSecret,
}

impl AppState {
    pub fn new(orchestrator: PaymentOrchestrator, webhook_secret: WebhookSecret) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            webhook_secret,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/payment-intent",
            post(handlers::create_payment_intent).get(handlers::get_payment_intent),
        )
        .route("/capture-payment", post(handlers::capture_payment))
        .route(
            "/payment-distribution",
            post(handlers::create_payment_distribution).get(handlers::list_payment_distributions),
        )
        .route("/release-holdback", post(handlers::release_holdback))
        .route("/refund", post(handlers::refund_payment))
        .route("/analytics", get(handlers::platform_analytics))
        .route("/webhook", post(handlers::webhook))
        .with_state(state)
}
