use super::codec::QUOTA;
use super::coins::Coins;
use super::transfer::{Transfer, total_amount};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// How much overhead an activation pays on top of the amounts it disburses.
///
/// `overhead(count) = (count + chunks) * overhead_fee`, where `chunks` is
/// `ceil(count / QUOTA)` when `charge_per_chunk` is set and zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    pub overhead_fee: Coins,
    pub charge_per_chunk: bool,
}

impl FeePolicy {
    /// Per-action cost of 0.1.
    pub fn default_fee() -> Coins {
        Coins::from_nano(100_000_000)
    }

    /// Reference policy: one fee unit per transfer plus one per started chunk.
    pub fn per_chunk(overhead_fee: Coins) -> Self {
        Self {
            overhead_fee,
            charge_per_chunk: true,
        }
    }

    /// One fee unit per transfer, no chunk share.
    pub fn per_transfer(overhead_fee: Coins) -> Self {
        Self {
            overhead_fee,
            charge_per_chunk: false,
        }
    }

    /// Number of fee units charged for `count` transfers.
    pub fn fee_units(&self, count: usize) -> usize {
        let chunk_units = if self.charge_per_chunk {
            count.div_ceil(QUOTA)
        } else {
            0
        };
        count + chunk_units
    }

    pub fn overhead(&self, count: usize) -> Result<Coins> {
        self.overhead_fee.checked_mul(self.fee_units(count) as u128)
    }

    /// Value that must accompany an activation processing `transfers`.
    ///
    /// Used for the whole list at creation and for each step's slice.
    pub fn required(&self, transfers: &[Transfer]) -> Result<Coins> {
        total_amount(transfers)?.checked_add(self.overhead(transfers.len())?)
    }
}

/// Funding summary for a transfer list before a job is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub transfers: usize,
    pub steps: usize,
    pub total_amount: Coins,
    pub overhead: Coins,
    /// Value that funds every step of the job.
    pub total_required: Coins,
    /// Value the creating activation needs on its own.
    pub first_step_required: Coins,
}

impl FeePolicy {
    pub fn quote(&self, transfers: &[Transfer]) -> Result<Quote> {
        let first_step = &transfers[..transfers.len().min(QUOTA)];
        Ok(Quote {
            transfers: transfers.len(),
            steps: transfers.len().div_ceil(QUOTA),
            total_amount: total_amount(transfers)?,
            overhead: self.overhead(transfers.len())?,
            total_required: self.required(transfers)?,
            first_step_required: self.required(first_step)?,
        })
    }
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self::per_chunk(Self::default_fee())
    }
}
