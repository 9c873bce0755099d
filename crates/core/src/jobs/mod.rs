//! Long-running job orchestration

pub mod poller;
pub mod ports;

pub use poller::{JobError, JobOptions, JobPoller};
