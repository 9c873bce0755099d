//! # CvForge Infrastructure
//!
//! Infrastructure implementations of core ports and the resilient API
//! access layer.
//!
//! This crate contains:
//! - The reqwest transport and the resilient request executor
//! - Session management with single-flight token refresh
//! - The authenticated API client and CV service
//! - Token storage adapters
//! - Configuration loading and logging setup
//!
//! ## Architecture
//! - Implements traits defined in `cvforge-core`
//! - Depends on `cvforge-common`, `cvforge-domain` and `cvforge-core`
//! - Contains all "impure" code (network and filesystem I/O)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use api::{
    default_rewrite_stages, ApiClient, ApiError, ApiErrorCategory, AuthClient, CvService,
    EnhancedError, SessionManager,
};
pub use errors::InfraError;
pub use http::{
    ApiResponse, ExecutorPolicy, FileUpload, HttpClient, HttpClientBuilder, RequestExecutor,
    RequestOptions, UploadProgress,
};
pub use storage::{FileTokenStore, MemoryTokenStore};
