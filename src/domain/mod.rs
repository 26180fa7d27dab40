//! Domain layer: value types, the transfer batch codec, the funding policy
//! and the job state machine. Nothing in here performs I/O.

pub mod accounting;
pub mod address;
pub mod codec;
pub mod coins;
pub mod gate;
pub mod job;
pub mod ports;
pub mod transfer;
