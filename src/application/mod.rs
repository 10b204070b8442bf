//! Application layer containing the payment lifecycle orchestration.
//!
//! This module defines the `PaymentOrchestrator`, the single entry point the
//! HTTP interface uses. It owns its collaborators through the domain ports, so
//! tests can swap in fakes for the gateway and the stores.

pub mod orchestrator;
