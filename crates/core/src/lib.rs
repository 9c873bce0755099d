//! # CvForge Core
//!
//! Transport-free orchestration logic.
//!
//! This crate contains:
//! - Port interfaces (traits) for credential persistence and session events
//! - Session state evaluation from the access token's expiry claim
//! - The job poller that drives asynchronous backend jobs to completion
//!
//! ## Architecture Principles
//! - Depends only on `cvforge-common` and `cvforge-domain`
//! - No HTTP or filesystem code; adapters live in `cvforge-infra`
//! - Long-running loops accept a `CancellationToken`

pub mod jobs;
pub mod session;

pub use jobs::ports::{AttemptBandEstimator, JobObserver, PollFailure, StageEstimator};
pub use jobs::{JobError, JobOptions, JobPoller};
pub use session::ports::{SessionListener, TokenStore};
pub use session::state::evaluate_state;
