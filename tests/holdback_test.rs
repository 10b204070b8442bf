mod common;

use chrono::{Duration, Utc};
use common::{FakeGateway, Op, orchestrator};
use rust_decimal_macros::dec;
use splitpay::domain::distribution::Complexity;
use splitpay::domain::ports::DistributionStore;
use splitpay::domain::records::DistributionStatus;
use splitpay::error::PaymentError;
use std::time::Duration as StdDuration;

#[tokio::test]
async fn test_release_pays_holdback_and_completes() {
    let gateway = FakeGateway::new();
    let (orchestrator, store) = orchestrator(&gateway);
    let record = orchestrator
        .process_payment_distribution("project_1", "pi_1", dec!(1000), "contractor_1", Complexity::Complex)
        .await
        .unwrap();

    let payout = orchestrator
        .release_holdback(&record.id, "project_1", "contractor_1")
        .await
        .unwrap();

    assert_eq!(payout.amount, dec!(100));
    assert_eq!(payout.metadata["type"], "holdback_release");
    assert_eq!(payout.metadata["paymentDistributionId"], record.id);

    let transfers = gateway.transfers();
    assert_eq!(transfers.len(), 2);
    assert_eq!(transfers[1].amount, 10000);
    assert_eq!(transfers[1].metadata["type"], "holdback_release");
    assert_eq!(
        transfers[1].idempotency_key,
        Some(format!("holdback_release:{}", record.id))
    );

    let stored = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DistributionStatus::Completed);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_second_release_has_no_holdback() {
    let gateway = FakeGateway::new();
    let (orchestrator, _) = orchestrator(&gateway);
    let record = orchestrator
        .process_payment_distribution("project_1", "pi_1", dec!(1000), "contractor_1", Complexity::Simple)
        .await
        .unwrap();

    orchestrator
        .release_holdback(&record.id, "project_1", "contractor_1")
        .await
        .unwrap();
    let err = orchestrator
        .release_holdback(&record.id, "project_1", "contractor_1")
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::NoHoldbackAvailableError));
    assert_eq!(err.to_string(), "No holdback amount available to release");
    assert_eq!(gateway.transfers().len(), 2);
}

#[tokio::test]
async fn test_release_unknown_or_mismatched_distribution() {
    let gateway = FakeGateway::new();
    let (orchestrator, _) = orchestrator(&gateway);

    let err = orchestrator
        .release_holdback("pd_unknown", "project_1", "contractor_1")
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::DistributionNotFound(_)));

    let record = orchestrator
        .process_payment_distribution("project_1", "pi_1", dec!(1000), "contractor_1", Complexity::Simple)
        .await
        .unwrap();
    let err = orchestrator
        .release_holdback(&record.id, "project_1", "contractor_2")
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::ValidationError(_)));
    assert_eq!(gateway.transfers().len(), 1);
}

#[tokio::test]
async fn test_failed_release_can_be_retried() {
    let gateway = FakeGateway::new();
    let (orchestrator, store) = orchestrator(&gateway);
    let record = orchestrator
        .process_payment_distribution("project_1", "pi_1", dec!(1000), "contractor_1", Complexity::Medium)
        .await
        .unwrap();

    gateway.fail(Op::Transfer, "Account restricted");
    let err = orchestrator
        .release_holdback(&record.id, "project_1", "contractor_1")
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::ContractorPayoutError(_)));
    assert_eq!(
        err.to_string(),
        "Failed to create contractor payout: Account restricted"
    );
    let stored = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DistributionStatus::Failed);

    gateway.heal(Op::Transfer);
    orchestrator
        .release_holdback(&record.id, "project_1", "contractor_1")
        .await
        .unwrap();
    let stored = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DistributionStatus::Completed);
}

#[tokio::test]
async fn test_concurrent_releases_pay_once() {
    let gateway = FakeGateway::new();
    let (orchestrator, store) = orchestrator(&gateway);
    let record = orchestrator
        .process_payment_distribution("project_1", "pi_1", dec!(1000), "contractor_1", Complexity::Medium)
        .await
        .unwrap();
    gateway.set_transfer_delay(StdDuration::from_millis(50));

    let (first, second) = tokio::join!(
        orchestrator.release_holdback(&record.id, "project_1", "contractor_1"),
        orchestrator.release_holdback(&record.id, "project_1", "contractor_1"),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(PaymentError::NoHoldbackAvailableError)))
    );
    let releases = gateway
        .transfers()
        .into_iter()
        .filter(|t| t.metadata["type"] == "holdback_release")
        .count();
    assert_eq!(releases, 1);
    let stored = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DistributionStatus::Completed);
}

#[tokio::test]
async fn test_retry_after_lost_response_does_not_pay_twice() {
    let gateway = FakeGateway::new();
    let (orchestrator, store) = orchestrator(&gateway);
    let record = orchestrator
        .process_payment_distribution("project_1", "pi_1", dec!(1000), "contractor_1", Complexity::Medium)
        .await
        .unwrap();

    // The transfer lands at the gateway but the caller only sees a transport error.
    gateway.lose_next_transfer_response();
    let err = orchestrator
        .release_holdback(&record.id, "project_1", "contractor_1")
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::ContractorPayoutError(_)));
    assert_eq!(gateway.transfers().len(), 2);

    let payout = orchestrator
        .release_holdback(&record.id, "project_1", "contractor_1")
        .await
        .unwrap();
    assert_eq!(payout.gateway_transfer_id, "tr_fake_2");
    assert_eq!(gateway.transfers().len(), 2);
    let stored = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DistributionStatus::Completed);
}

#[tokio::test]
async fn test_platform_analytics() {
    let gateway = FakeGateway::new();
    let (orchestrator, _) = orchestrator(&gateway);
    let start = Utc::now() - Duration::minutes(1);

    // fee 30, contractor 870, holdback 100 (completed below)
    let first = orchestrator
        .process_payment_distribution("project_1", "pi_1", dec!(1000), "contractor_1", Complexity::Simple)
        .await
        .unwrap();
    // fee 35, contractor 415, holdback 50
    orchestrator
        .process_payment_distribution("project_2", "pi_2", dec!(500), "contractor_2", Complexity::Complex)
        .await
        .unwrap();
    orchestrator
        .release_holdback(&first.id, "project_1", "contractor_1")
        .await
        .unwrap();

    let end = Utc::now() + Duration::minutes(1);
    let analytics = orchestrator.platform_analytics(start, end).await.unwrap();
    assert_eq!(analytics.total_payments, 2);
    assert_eq!(analytics.total_revenue, dec!(65));
    assert_eq!(analytics.total_payouts, dec!(1385));
    assert_eq!(analytics.average_platform_fee, dec!(32.5));

    let before = orchestrator
        .platform_analytics(start - Duration::hours(2), start - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(before.total_payments, 0);
    assert_eq!(before.average_platform_fee, dec!(0));
}
