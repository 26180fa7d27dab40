//! Application layer orchestrating disbursement jobs.
//!
//! `DisbursementEngine` turns the domain's pure execution step into the
//! Create / Continue / IsFinished operations, loading and persisting job
//! state through the `JobStore` port around each activation.

pub mod engine;
