use super::address::Address;
use super::coins::Coins;
use super::job::Job;
use crate::error::{DisbursementError, Result};

/// Decides whether `caller` may trigger a continuation step on `job`.
///
/// Only the controller recorded at creation passes. A job without a
/// controller can never be continued.
pub fn authorize_continuation(job: &Job, caller: &Address, supplied: Coins) -> Result<()> {
    match job.controller {
        Some(controller) if controller == *caller => Ok(()),
        _ => Err(DisbursementError::Unauthorized {
            caller: *caller,
            supplied,
        }),
    }
}
