#![cfg(feature = "storage-rocksdb")]

mod common;

use common::FakeGateway;
use rust_decimal_macros::dec;
use splitpay::application::orchestrator::PaymentOrchestrator;
use splitpay::domain::distribution::{Complexity, FeePolicy};
use splitpay::domain::records::DistributionStatus;
use splitpay::infrastructure::in_memory::DerivedContractorAccounts;
use splitpay::infrastructure::rocksdb::RocksDBDistributionStore;
use std::path::Path;
use tempfile::tempdir;

fn orchestrator(gateway: &FakeGateway, db_path: &Path) -> PaymentOrchestrator {
    let store = RocksDBDistributionStore::open(db_path).unwrap();
    PaymentOrchestrator::new(
        Box::new(gateway.clone()),
        Box::new(store),
        Box::new(DerivedContractorAccounts),
        FeePolicy::default(),
    )
}

#[tokio::test]
async fn test_holdback_survives_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");
    let gateway = FakeGateway::new();

    // 1. First process: distribute
    let distribution_id = {
        let orchestrator = orchestrator(&gateway, &db_path);
        let record = orchestrator
            .process_payment_distribution("project_1", "pi_1", dec!(1000), "contractor_1", Complexity::Medium)
            .await
            .unwrap();
        record.id
    };

    // 2. Second process: release against the recovered record
    let orchestrator = orchestrator(&gateway, &db_path);
    let recovered = orchestrator.get_distribution(&distribution_id).await.unwrap();
    assert_eq!(recovered.holdback_amount, dec!(100));
    assert_eq!(recovered.status, DistributionStatus::Processing);

    let payout = orchestrator
        .release_holdback(&distribution_id, "project_1", "contractor_1")
        .await
        .unwrap();
    assert_eq!(payout.amount, dec!(100));

    let listed = orchestrator.list_distributions("project_1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, DistributionStatus::Completed);
}
