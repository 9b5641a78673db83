//! Append-only partition storage (in memory).

mod log;

pub use log::PartitionLog;
