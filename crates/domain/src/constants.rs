//! Application constants
//!
//! Default values for the API access layer. Configuration structs fall back
//! to these when a field is omitted.

// Request executor
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_REWRITE_TIMEOUT_SECS: u64 = 90;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_MS: [u64; 4] = [1_000, 2_000, 4_000, 8_000];

// Cache & circuit registry
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_COOLDOWN_SECS: u64 = 30;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1_000;

// Session endpoints
pub const TOKEN_REFRESH_PATH: &str = "/api/token/refresh/";
pub const TOKEN_OBTAIN_PATH: &str = "/api/token/";
pub const REGISTER_PATH: &str = "/api/auth/register/";
pub const PASSWORD_RESET_PATH: &str = "/api/auth/password-reset/";

// Persisted credential keys
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const DEFAULT_TOKEN_STORE_FILE: &str = "cvforge-session.json";

// Job poller
pub const DEFAULT_JOB_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_JOB_POLL_INTERVAL_MS: u64 = 2_000;
pub const REWRITE_PATH: &str = "/api/cv/rewrite/";
pub const REWRITE_STATUS_PATH: &str = "/api/cv/rewrite/{session_id}/status/";
pub const UPLOAD_PATH: &str = "/api/cv/upload/";

/// Placeholder substituted with the job session id in status paths.
pub const SESSION_ID_PLACEHOLDER: &str = "{session_id}";
