use crate::domain::accounting::{FeePolicy, Quote};
use crate::domain::address::Address;
use crate::domain::coins::Coins;
use crate::domain::gate::authorize_continuation;
use crate::domain::job::{ActivationReport, Job, JobId};
use crate::domain::ports::JobStoreBox;
use crate::domain::transfer::Transfer;
use crate::error::{DisbursementError, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Settings for a [`DisbursementEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub fee_policy: FeePolicy,
}

/// Everything needed to create a job and run its first step.
#[derive(Debug, Clone)]
pub struct CreateJob {
    pub transfers: Vec<Transfer>,
    /// Identity allowed to continue the job. Required above one step.
    pub controller: Option<Address>,
    /// Caller of the creating activation; receives any refund.
    pub initiator: Address,
    pub supplied: Coins,
    pub created_at: u64,
}

/// The main entry point for disbursement jobs.
///
/// `DisbursementEngine` owns the job store and runs every activation as a
/// load, step, store sequence. Activations are serialized: one finishes and
/// persists before the next one loads any state.
pub struct DisbursementEngine {
    job_store: JobStoreBox,
    config: EngineConfig,
    activation_lock: Mutex<()>,
}

impl DisbursementEngine {
    /// Creates a new `DisbursementEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `job_store` - The store holding job state between activations.
    /// * `config` - Fee policy applied to every activation.
    pub fn new(job_store: JobStoreBox, config: EngineConfig) -> Self {
        Self {
            job_store,
            config,
            activation_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Funding summary for `transfers` under the configured policy.
    pub fn quote(&self, transfers: &[Transfer]) -> Result<Quote> {
        self.config.fee_policy.quote(transfers)
    }

    /// Creates a job and runs its first execution step.
    ///
    /// If the step cannot be funded nothing is persisted. Every error
    /// returned here reports the supplied value through
    /// [`DisbursementError::refund`], owed back to the initiator.
    pub async fn create(&self, request: CreateJob) -> Result<ActivationReport> {
        let supplied = request.supplied;
        self.run_create(request)
            .await
            .map_err(|e| e.aborting(supplied))
    }

    async fn run_create(&self, request: CreateJob) -> Result<ActivationReport> {
        let _guard = self.activation_lock.lock().await;
        let policy = &self.config.fee_policy;

        let mut job = Job::new(
            &request.transfers,
            request.controller,
            request.created_at,
            policy,
        )
        .inspect_err(|e| warn!(error = %e, "job creation rejected"))?;
        debug!(job = %job.id, chunks = job.pending().len(), "built job state");

        if self.job_store.exists(&job.id).await? {
            warn!(job = %job.id, "job already exists");
            return Err(DisbursementError::JobAlreadyExists(job.id.to_string()));
        }

        let report = if job.finished {
            ActivationReport::refund_only(job.id, request.initiator, request.supplied)
        } else {
            job.activate(request.initiator, request.supplied, policy)
                .inspect_err(|e| warn!(job = %job.id, error = %e, "creating activation aborted"))?
        };

        self.job_store.store(job).await?;
        info!(
            job = %report.job_id,
            transfers = request.transfers.len(),
            dispatched = report.transfers().count(),
            finished = report.finished,
            "job created"
        );
        Ok(report)
    }

    /// Runs one more execution step on an existing job.
    ///
    /// Only the job's controller may continue it. A rejected continuation
    /// leaves the stored job exactly as it was and its error reports the
    /// supplied value as owed back to the caller.
    pub async fn continue_job(
        &self,
        id: &JobId,
        caller: Address,
        supplied: Coins,
    ) -> Result<ActivationReport> {
        self.run_continue(id, caller, supplied)
            .await
            .map_err(|e| e.aborting(supplied))
    }

    async fn run_continue(
        &self,
        id: &JobId,
        caller: Address,
        supplied: Coins,
    ) -> Result<ActivationReport> {
        let _guard = self.activation_lock.lock().await;

        let mut job = self
            .job_store
            .get(id)
            .await?
            .ok_or_else(|| DisbursementError::JobNotFound(id.to_string()))?;

        authorize_continuation(&job, &caller, supplied)
            .inspect_err(|e| warn!(job = %id, error = %e, "continuation rejected"))?;

        let report = job
            .activate(caller, supplied, &self.config.fee_policy)
            .inspect_err(|e| warn!(job = %id, error = %e, "continuation aborted"))?;

        debug!(job = %id, remaining = report.remaining_transfers, "persisting job");
        self.job_store.store(job).await?;
        info!(
            job = %id,
            dispatched = report.transfers().count(),
            finished = report.finished,
            "job continued"
        );
        Ok(report)
    }

    pub async fn job(&self, id: &JobId) -> Result<Job> {
        self.job_store
            .get(id)
            .await?
            .ok_or_else(|| DisbursementError::JobNotFound(id.to_string()))
    }

    pub async fn is_finished(&self, id: &JobId) -> Result<bool> {
        Ok(self.job(id).await?.finished)
    }

    /// Consumes the engine and returns every stored job.
    pub async fn into_results(self) -> Result<Vec<Job>> {
        self.job_store.get_all().await
    }
}
