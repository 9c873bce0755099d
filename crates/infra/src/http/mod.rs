//! HTTP transport and the resilient request executor

pub mod client;
pub mod executor;
pub mod options;
pub mod upload;

pub use client::{HttpClient, HttpClientBuilder};
pub use executor::{ExecutorPolicy, RequestExecutor};
pub use options::{ApiResponse, RequestOptions};
pub use upload::{FileUpload, UploadProgress};
