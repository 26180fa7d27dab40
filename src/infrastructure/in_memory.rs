use crate::domain::job::{Job, JobId};
use crate::domain::ports::JobStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for disbursement jobs.
///
/// Uses `Arc<RwLock<HashMap<JobId, Job>>>` so clones share the same jobs.
/// Suited to tests and single-process runs where nothing has to survive a restart.
#[derive(Default, Clone)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl InMemoryJobStore {
    /// Creates a new, empty in-memory job store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn store(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by_key(|job| (job.created_at, job.id));
        Ok(all)
    }

    async fn exists(&self, id: &JobId) -> Result<bool> {
        Ok(self.jobs.read().await.contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::accounting::FeePolicy;
    use crate::domain::address::Address;
    use crate::domain::coins::Coins;
    use crate::domain::transfer::Transfer;

    fn job(created_at: u64) -> Job {
        let list = vec![Transfer::new(Address::new(0, [3; 32]), Coins::from_nano(10))];
        Job::new(&list, None, created_at, &FeePolicy::default()).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_job_store() {
        let store = InMemoryJobStore::new();
        let job = job(1);

        store.store(job.clone()).await.unwrap();
        let retrieved = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(retrieved, job);
        assert!(store.exists(&job.id).await.unwrap());

        let missing = JobId([0; 32]);
        assert!(store.get(&missing).await.unwrap().is_none());
        assert!(!store.exists(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_store_overwrites_whole_job() {
        let store = InMemoryJobStore::new();
        let mut job = job(1);
        store.store(job.clone()).await.unwrap();

        job.activate(Address::new(0, [1; 32]), Coins::from_nano(10_000_000_000), &FeePolicy::default())
            .unwrap();
        store.store(job.clone()).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].finished);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryJobStore::new();
        let view = store.clone();
        store.store(job(1)).await.unwrap();
        store.store(job(2)).await.unwrap();

        let all = view.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at < all[1].created_at);
    }
}
