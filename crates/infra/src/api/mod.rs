//! Backend API access
//!
//! - [`auth`]: auth-exempt calls (login, registration, password reset, refresh)
//! - [`session`]: credential ownership and single-flight refresh
//! - [`client`]: bearer attachment with refresh-and-replay
//! - [`cv`]: CV upload and the rewrite job

pub mod auth;
pub mod client;
pub mod cv;
pub mod errors;
pub mod session;

pub use auth::AuthClient;
pub use client::ApiClient;
pub use cv::{default_rewrite_stages, CvService};
pub use errors::{ApiError, ApiErrorCategory, EnhancedError};
pub use session::SessionManager;
