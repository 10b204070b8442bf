use crate::domain::ports::DistributionStore;
use crate::domain::records::PaymentDistributionRecord;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing distribution records, keyed by distribution id.
pub const CF_DISTRIBUTIONS: &str = "distributions";

/// A persistent distribution store backed by RocksDB.
///
/// Records are stored as JSON under their `pd_` id. Project lookups scan the
/// column family; distribution volume per deployment is small enough for this.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBDistributionStore {
    db: Arc<DB>,
}

impl RocksDBDistributionStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "distributions" column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_DISTRIBUTIONS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn scan(&self) -> Result<Vec<PaymentDistributionRecord>> {
        let cf = self.db.cf_handle(CF_DISTRIBUTIONS).ok_or_else(missing_cf)?;

        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            let record: PaymentDistributionRecord =
                serde_json::from_slice(&value).map_err(|e| {
                    PaymentError::InternalError(Box::new(std::io::Error::other(format!(
                        "Failed to deserialize distribution: {}",
                        e
                    ))))
                })?;
            records.push(record);
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}

fn missing_cf() -> PaymentError {
    PaymentError::InternalError(Box::new(std::io::Error::other(
        "Distributions column family not found",
    )))
}

#[async_trait]
impl DistributionStore for RocksDBDistributionStore {
    async fn store(&self, record: PaymentDistributionRecord) -> Result<()> {
        let cf = self.db.cf_handle(CF_DISTRIBUTIONS).ok_or_else(missing_cf)?;

        let value = serde_json::to_vec(&record).map_err(|e| {
            PaymentError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })?;

        self.db.put_cf(&cf, record.id.as_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PaymentDistributionRecord>> {
        let cf = self.db.cf_handle(CF_DISTRIBUTIONS).ok_or_else(missing_cf)?;

        match self.db.get_cf(&cf, id.as_bytes())? {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes).map_err(|e| {
                    PaymentError::InternalError(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Deserialization error: {}", e),
                    )))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn by_project(&self, project_id: &str) -> Result<Vec<PaymentDistributionRecord>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|r| r.project_id == project_id)
            .collect())
    }

    async fn all(&self) -> Result<Vec<PaymentDistributionRecord>> {
        self.scan()
    }
}
