use crate::domain::ports::{ContractorAccounts, DistributionStore};
use crate::domain::records::PaymentDistributionRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for distribution records.
///
/// Uses `Arc<RwLock<HashMap<String, PaymentDistributionRecord>>>` for shared
/// concurrent access. Records are lost on restart; use the RocksDB store when
/// holdbacks must survive a redeploy.
#[derive(Default, Clone)]
pub struct InMemoryDistributionStore {
    records: Arc<RwLock<HashMap<String, PaymentDistributionRecord>>>,
}

impl InMemoryDistributionStore {
    /// Creates a new, empty in-memory distribution store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributionStore for InMemoryDistributionStore {
    async fn store(&self, record: PaymentDistributionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PaymentDistributionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn by_project(&self, project_id: &str) -> Result<Vec<PaymentDistributionRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<_> = records
            .values()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        Ok(matching)
    }

    async fn all(&self) -> Result<Vec<PaymentDistributionRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        Ok(all)
    }
}

/// Derives the destination account as `acct_<contractorId>`.
///
/// Only valid when contractor ids are themselves the suffix of their connected
/// account ids. Prefer [`InMemoryContractorAccounts`] (or a real directory)
/// when the mapping is known.
#[derive(Default, Clone, Copy)]
pub struct DerivedContractorAccounts;

#[async_trait]
impl ContractorAccounts for DerivedContractorAccounts {
    async fn destination_for(&self, contractor_id: &str) -> Result<Option<String>> {
        if contractor_id.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("acct_{contractor_id}")))
    }
}

/// Explicit contractor → connected account mapping.
#[derive(Default, Clone)]
pub struct InMemoryContractorAccounts {
    accounts: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryContractorAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, contractor_id: &str, account_id: &str) {
        let mut accounts = self.accounts.write().await;
        accounts.insert(contractor_id.to_string(), account_id.to_string());
    }
}

#[async_trait]
impl ContractorAccounts for InMemoryContractorAccounts {
    async fn destination_for(&self, contractor_id: &str) -> Result<Option<String>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(contractor_id).cloned())
    }
}
