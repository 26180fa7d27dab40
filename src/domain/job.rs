use super::accounting::FeePolicy;
use super::address::Address;
use super::codec::{ChunkChain, MAX_TOTAL, QUOTA};
use super::coins::Coins;
use super::transfer::{OutboundAction, Transfer, total_amount};
use crate::error::{DisbursementError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Deterministic identity of a job, derived from its initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub [u8; 32]);

impl JobId {
    /// SHA-256 over the encoded transfer chain, the controller and the
    /// creation timestamp.
    pub fn derive(encoded_chain: &[u8], controller: Option<&Address>, created_at: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(encoded_chain);
        match controller {
            Some(address) => {
                hasher.update([1u8, address.workchain as u8]);
                hasher.update(address.hash);
            }
            None => hasher.update([0u8]),
        }
        hasher.update(created_at.to_be_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for JobId {
    type Err = DisbursementError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| DisbursementError::ValidationError(format!("invalid job id: {e}")))?;
        let id: [u8; 32] = bytes.try_into().map_err(|_| {
            DisbursementError::ValidationError("job id must be 32 bytes".to_string())
        })?;
        Ok(Self(id))
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Persisted state of one disbursement job.
///
/// A job is created once and afterwards only changed by [`Job::activate`].
/// It keeps these invariants at all times:
///
/// * `disbursed_so_far + sum(pending amounts) == total_amount`
/// * `finished == pending.is_empty()`
/// * a finished job retains no balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pending: ChunkChain,
    /// Sum of all transfer amounts in the original list.
    pub total_amount: Coins,
    /// `total_amount` plus overhead for the whole list, fixed at creation.
    pub total_required: Coins,
    pub disbursed_so_far: Coins,
    pub fees_charged: Coins,
    /// Value kept between steps to fund the next one.
    pub balance: Coins,
    pub controller: Option<Address>,
    pub finished: bool,
    pub created_at: u64,
    pub activations: u32,
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub job_id: JobId,
    /// Destination transfers in list order, then the refund if any.
    pub actions: Vec<OutboundAction>,
    pub disbursed: Coins,
    pub fees: Coins,
    pub refund: Coins,
    pub retained: Coins,
    pub finished: bool,
    pub remaining_transfers: usize,
}

impl ActivationReport {
    /// Report for an activation that dispatches nothing and returns `supplied`.
    pub fn refund_only(job_id: JobId, caller: Address, supplied: Coins) -> Self {
        let actions = if supplied.is_zero() {
            Vec::new()
        } else {
            vec![OutboundAction::Refund {
                to: caller,
                amount: supplied,
            }]
        };
        Self {
            job_id,
            actions,
            disbursed: Coins::ZERO,
            fees: Coins::ZERO,
            refund: supplied,
            retained: Coins::ZERO,
            finished: true,
            remaining_transfers: 0,
        }
    }

    pub fn transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.actions.iter().filter_map(|action| match action {
            OutboundAction::Transfer(t) => Some(t),
            OutboundAction::Refund { .. } => None,
        })
    }
}

impl Job {
    /// Builds the initial state for `transfers`. Nothing is dispatched.
    pub fn new(
        transfers: &[Transfer],
        controller: Option<Address>,
        created_at: u64,
        policy: &FeePolicy,
    ) -> Result<Self> {
        if transfers.len() > MAX_TOTAL {
            return Err(DisbursementError::OversizedList {
                count: transfers.len(),
                max: MAX_TOTAL,
            });
        }
        if controller.is_none() && transfers.len() > QUOTA {
            return Err(DisbursementError::ControllerRequired {
                count: transfers.len(),
                quota: QUOTA,
            });
        }

        let pending = ChunkChain::partition(transfers)?;
        let id = JobId::derive(&pending.encode(), controller.as_ref(), created_at);
        let finished = pending.is_empty();

        Ok(Self {
            id,
            pending,
            total_amount: total_amount(transfers)?,
            total_required: policy.required(transfers)?,
            disbursed_so_far: Coins::ZERO,
            fees_charged: Coins::ZERO,
            balance: Coins::ZERO,
            controller,
            finished,
            created_at,
            activations: 0,
        })
    }

    pub fn pending(&self) -> &ChunkChain {
        &self.pending
    }

    /// Value the next activation must bring, after counting the retained balance.
    pub fn next_step_required(&self, policy: &FeePolicy) -> Result<Option<Coins>> {
        match self.pending.next_step() {
            Some(step) => Ok(Some(
                policy.required(&step.transfers)?.saturating_sub(self.balance),
            )),
            None => Ok(None),
        }
    }

    /// Runs one execution step.
    ///
    /// Either the next chunks up to the quota are consumed in full and the
    /// job moves forward, or an error is returned and the job is untouched.
    pub fn activate(
        &mut self,
        caller: Address,
        supplied: Coins,
        policy: &FeePolicy,
    ) -> Result<ActivationReport> {
        let Some(step) = self.pending.next_step().filter(|_| !self.finished) else {
            return Err(DisbursementError::AlreadyFinished {
                job: self.id.to_string(),
                supplied,
            });
        };

        let step_amount = total_amount(&step.transfers)?;
        let step_required = policy.required(&step.transfers)?;
        let available = self.balance.checked_add(supplied)?;
        if available < step_required {
            return Err(DisbursementError::InsufficientFunding {
                required: step_required.saturating_sub(self.balance),
                supplied,
            });
        }

        let fees = step_required.checked_sub(step_amount)?;
        let surplus = available.checked_sub(step_required)?;
        let disbursed_so_far = self.disbursed_so_far.checked_add(step_amount)?;
        let fees_charged = self.fees_charged.checked_add(fees)?;

        self.pending.advance(&step);
        self.disbursed_so_far = disbursed_so_far;
        self.fees_charged = fees_charged;
        self.activations += 1;
        self.finished = self.pending.is_empty();

        let refund = if self.finished {
            self.balance = Coins::ZERO;
            surplus
        } else {
            self.balance = surplus;
            Coins::ZERO
        };

        let mut actions: Vec<OutboundAction> = step
            .transfers
            .iter()
            .copied()
            .map(OutboundAction::Transfer)
            .collect();
        if !refund.is_zero() {
            actions.push(OutboundAction::Refund {
                to: caller,
                amount: refund,
            });
        }

        Ok(ActivationReport {
            job_id: self.id,
            actions,
            disbursed: step_amount,
            fees,
            refund,
            retained: self.balance,
            finished: self.finished,
            remaining_transfers: self.pending.transfer_count(),
        })
    }

    pub fn check_invariants(&self) -> Result<()> {
        let pending_amount = total_amount(self.pending.transfers())?;
        if self.disbursed_so_far.checked_add(pending_amount)? != self.total_amount {
            return Err(DisbursementError::CorruptState(format!(
                "disbursed {} plus pending {} does not match total {}",
                self.disbursed_so_far, pending_amount, self.total_amount
            )));
        }
        if self.finished != self.pending.is_empty() {
            return Err(DisbursementError::CorruptState(format!(
                "finished flag {} disagrees with {} pending chunks",
                self.finished,
                self.pending.len()
            )));
        }
        if self.finished && !self.balance.is_zero() {
            return Err(DisbursementError::CorruptState(format!(
                "finished job retains balance {}",
                self.balance
            )));
        }
        Ok(())
    }
}

/// Serialized form of a [`Job`]; pending chunks are kept in codec form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub pending_chunks: String,
    pub total_amount: Coins,
    pub total_required: Coins,
    pub disbursed_so_far: Coins,
    pub fees_charged: Coins,
    pub balance: Coins,
    pub controller: Option<Address>,
    pub finished: bool,
    pub created_at: u64,
    pub activations: u32,
}

impl From<&Job> for JobRecord {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            pending_chunks: job.pending.to_hex(),
            total_amount: job.total_amount,
            total_required: job.total_required,
            disbursed_so_far: job.disbursed_so_far,
            fees_charged: job.fees_charged,
            balance: job.balance,
            controller: job.controller,
            finished: job.finished,
            created_at: job.created_at,
            activations: job.activations,
        }
    }
}

impl TryFrom<JobRecord> for Job {
    type Error = DisbursementError;

    fn try_from(record: JobRecord) -> Result<Self> {
        let job = Self {
            id: record.id,
            pending: ChunkChain::from_hex(&record.pending_chunks)?,
            total_amount: record.total_amount,
            total_required: record.total_required,
            disbursed_so_far: record.disbursed_so_far,
            fees_charged: record.fees_charged,
            balance: record.balance,
            controller: record.controller,
            finished: record.finished,
            created_at: record.created_at,
            activations: record.activations,
        };
        job.check_invariants()?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::codec::CodecError;
    use rust_decimal_macros::dec;

    fn coins(value: rust_decimal::Decimal) -> Coins {
        Coins::from_decimal(value).unwrap()
    }

    fn address(n: u64) -> Address {
        let mut hash = [0u8; 32];
        hash[24..].copy_from_slice(&n.to_be_bytes());
        Address::new(0, hash)
    }

    fn transfers(n: usize, amount: Coins) -> Vec<Transfer> {
        (0..n)
            .map(|i| Transfer::new(address(1000 + i as u64), amount))
            .collect()
    }

    #[test]
    fn test_new_job_state() {
        let list = transfers(300, coins(dec!(1)));
        let policy = FeePolicy::default();
        let job = Job::new(&list, Some(address(1)), 7, &policy).unwrap();

        assert_eq!(job.total_amount, coins(dec!(300)));
        assert_eq!(job.total_required, coins(dec!(300) + dec!(30.2)));
        assert_eq!(job.pending().len(), 2);
        assert!(!job.finished);
        job.check_invariants().unwrap();
    }

    #[test]
    fn test_empty_job_is_finished() {
        let job = Job::new(&[], None, 0, &FeePolicy::default()).unwrap();
        assert!(job.finished);
        assert_eq!(job.total_required, Coins::ZERO);
    }

    #[test]
    fn test_new_rejects_oversized_and_uncontrolled() {
        let policy = FeePolicy::default();
        let too_many = transfers(MAX_TOTAL + 1, coins(dec!(1)));
        assert!(matches!(
            Job::new(&too_many, Some(address(1)), 0, &policy),
            Err(DisbursementError::OversizedList { count: 1017, .. })
        ));

        let multi_step = transfers(QUOTA + 1, coins(dec!(1)));
        assert!(matches!(
            Job::new(&multi_step, None, 0, &policy),
            Err(DisbursementError::ControllerRequired { .. })
        ));
        assert!(Job::new(&multi_step[..QUOTA], None, 0, &policy).is_ok());
    }

    #[test]
    fn test_id_depends_on_inputs() {
        let policy = FeePolicy::default();
        let list = transfers(3, coins(dec!(1)));
        let a = Job::new(&list, Some(address(1)), 5, &policy).unwrap();
        let b = Job::new(&list, Some(address(1)), 5, &policy).unwrap();
        let c = Job::new(&list, Some(address(2)), 5, &policy).unwrap();
        let d = Job::new(&list, Some(address(1)), 6, &policy).unwrap();
        let e = Job::new(&list, None, 5, &policy).unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_ne!(a.id, d.id);
        assert_ne!(a.id, e.id);
    }

    #[test]
    fn test_job_id_text_round_trip() {
        let id = JobId::derive(b"chain", None, 1);
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("abc".parse::<JobId>().is_err());
    }

    #[test]
    fn test_activate_single_step_refunds_surplus() {
        let policy = FeePolicy::default();
        let controller = address(1);
        let mut job = Job::new(&transfers(2, coins(dec!(1))), Some(controller), 0, &policy).unwrap();

        let report = job.activate(controller, coins(dec!(3)), &policy).unwrap();

        assert!(report.finished);
        assert_eq!(report.transfers().count(), 2);
        assert_eq!(report.disbursed, coins(dec!(2)));
        assert_eq!(report.fees, coins(dec!(0.3)));
        assert_eq!(report.refund, coins(dec!(0.7)));
        assert_eq!(
            report.actions.last(),
            Some(&OutboundAction::Refund {
                to: controller,
                amount: coins(dec!(0.7))
            })
        );
        assert_eq!(job.balance, Coins::ZERO);
        assert_eq!(job.disbursed_so_far, job.total_amount);
        job.check_invariants().unwrap();
    }

    #[test]
    fn test_activate_retains_surplus_for_next_step() {
        let policy = FeePolicy::default();
        let controller = address(1);
        let list = transfers(300, coins(dec!(1)));
        let mut job = Job::new(&list, Some(controller), 0, &policy).unwrap();

        // First step needs 254 + 25.5; bring 5 extra.
        let report = job.activate(controller, coins(dec!(284.5)), &policy).unwrap();
        assert!(!report.finished);
        assert_eq!(report.refund, Coins::ZERO);
        assert_eq!(report.retained, coins(dec!(5)));
        assert_eq!(report.remaining_transfers, 46);

        // Second step needs 46 + 4.7 = 50.7, the 5 retained count towards it.
        assert_eq!(
            job.next_step_required(&policy).unwrap(),
            Some(coins(dec!(45.7)))
        );
        let err = job.activate(controller, coins(dec!(45.6)), &policy).unwrap_err();
        assert!(matches!(
            err,
            DisbursementError::InsufficientFunding { required, .. } if required == coins(dec!(45.7))
        ));

        let report = job.activate(controller, coins(dec!(45.7)), &policy).unwrap();
        assert!(report.finished);
        assert_eq!(report.refund, Coins::ZERO);
        assert_eq!(job.fees_charged, coins(dec!(30.2)));
        job.check_invariants().unwrap();
    }

    #[test]
    fn test_rejected_activation_leaves_job_untouched() {
        let policy = FeePolicy::default();
        let controller = address(1);
        let mut job = Job::new(&transfers(10, coins(dec!(1))), Some(controller), 0, &policy).unwrap();
        let before = job.clone();

        let err = job.activate(controller, coins(dec!(10)), &policy).unwrap_err();
        assert_eq!(err.refund(), Some(coins(dec!(10))));
        assert_eq!(job, before);
    }

    #[test]
    fn test_activate_finished_job_fails() {
        let policy = FeePolicy::default();
        let mut job = Job::new(&[], None, 0, &policy).unwrap();
        let err = job.activate(address(1), coins(dec!(1)), &policy).unwrap_err();
        assert!(matches!(err, DisbursementError::AlreadyFinished { .. }));
        assert_eq!(err.refund(), Some(coins(dec!(1))));
    }

    #[test]
    fn test_record_round_trip_after_step() {
        let policy = FeePolicy::default();
        let controller = address(1);
        let mut job = Job::new(&transfers(300, coins(dec!(1))), Some(controller), 0, &policy).unwrap();
        job.activate(controller, coins(dec!(279.5)), &policy).unwrap();

        let record = JobRecord::from(&job);
        let json = serde_json::to_string(&record).unwrap();
        let back: JobRecord = serde_json::from_str(&json).unwrap();
        let reloaded = Job::try_from(back).unwrap();
        assert_eq!(reloaded.pending().transfer_count(), 46);
        assert_eq!(reloaded.disbursed_so_far, job.disbursed_so_far);
        assert_eq!(reloaded.id, job.id);
    }

    #[test]
    fn test_record_with_corrupt_chunks_is_rejected() {
        let policy = FeePolicy::default();
        let job = Job::new(&transfers(3, coins(dec!(1))), Some(address(1)), 0, &policy).unwrap();

        let mut record = JobRecord::from(&job);
        record.pending_chunks.truncate(record.pending_chunks.len() - 2);
        record.pending_chunks.push_str("01");
        assert!(matches!(
            Job::try_from(record),
            Err(DisbursementError::MalformedEncoding(
                CodecError::MissingSuccessor { chunk: 0 }
            ))
        ));

        let mut record = JobRecord::from(&job);
        record.disbursed_so_far = coins(dec!(1));
        assert!(matches!(
            Job::try_from(record),
            Err(DisbursementError::CorruptState(_))
        ));
    }
}
