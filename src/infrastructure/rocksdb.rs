use crate::domain::job::{Job, JobId, JobRecord};
use crate::domain::ports::JobStore;
use crate::error::{DisbursementError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Column Family for storing job records.
pub const CF_JOBS: &str = "jobs";

/// A persistent job store backed by RocksDB.
///
/// Jobs are stored as JSON [`JobRecord`]s keyed by the 32 identity bytes.
/// Reloading decodes the pending chunk chain, so a damaged record surfaces
/// as `MalformedEncoding` instead of reaching an activation.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "jobs" column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_jobs = ColumnFamilyDescriptor::new(CF_JOBS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_jobs])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn jobs_cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(CF_JOBS).ok_or_else(|| {
            DisbursementError::InternalError(Box::new(std::io::Error::other(
                "Jobs column family not found",
            )))
        })
    }

    fn decode(bytes: &[u8]) -> Result<Job> {
        let record: JobRecord = serde_json::from_slice(bytes).map_err(|e| {
            DisbursementError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Deserialization error: {}", e),
            )))
        })?;
        Job::try_from(record)
    }

    /// Writes raw bytes under a job key. Only used to simulate damaged records.
    #[cfg(test)]
    fn put_raw(&self, id: &JobId, bytes: &[u8]) -> Result<()> {
        let cf = self.jobs_cf()?;
        self.db.put_cf(cf, id.as_bytes(), bytes)?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for RocksDBStore {
    async fn store(&self, job: Job) -> Result<()> {
        let cf = self.jobs_cf()?;
        let value = serde_json::to_vec(&JobRecord::from(&job)).map_err(|e| {
            DisbursementError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })?;

        self.db.put_cf(cf, job.id.as_bytes(), value)?;
        debug!(job = %job.id, finished = job.finished, "persisted job");

        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        let cf = self.jobs_cf()?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Self::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> Result<Vec<Job>> {
        let cf = self.jobs_cf()?;

        let mut jobs = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            jobs.push(Self::decode(&value)?);
        }

        Ok(jobs)
    }

    async fn exists(&self, id: &JobId) -> Result<bool> {
        let cf = self.jobs_cf()?;
        // Just check if the key exists without retrieving the value
        let result = self.db.get_pinned_cf(cf, id.as_bytes())?;
        Ok(result.is_some())
    }
}
