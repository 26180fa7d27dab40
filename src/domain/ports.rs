use super::job::{Job, JobId};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence for disbursement jobs, keyed by their identity.
///
/// Implementations store and reload a job as a whole; there are no partial
/// updates.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn store(&self, job: Job) -> Result<()>;
    async fn get(&self, id: &JobId) -> Result<Option<Job>>;
    async fn get_all(&self) -> Result<Vec<Job>>;

    async fn exists(&self, id: &JobId) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }
}

pub type JobStoreBox = Box<dyn JobStore>;
