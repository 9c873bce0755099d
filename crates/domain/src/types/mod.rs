//! Domain types and models

pub mod auth;
pub mod job;

pub use auth::{
    CredentialPair, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, SessionState,
};
pub use job::{
    JobProgress, JobSession, JobStatus, JobStatusReport, JobTicket, RewriteRequest,
    StageDefinition, UploadReceipt,
};
