//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the base URL is not set, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `CVFORGE_API_BASE_URL`: Backend base URL (required)
//! - `CVFORGE_REQUEST_TIMEOUT_SECS`: Per-attempt timeout in seconds
//! - `CVFORGE_MAX_RETRIES`: Retry budget for transient failures
//! - `CVFORGE_BACKOFF_MS`: Comma-separated backoff delays in milliseconds
//! - `CVFORGE_POLL_INTERVAL_MS`: Job poll interval in milliseconds
//! - `CVFORGE_JOB_MAX_ATTEMPTS`: Job poll budget
//! - `CVFORGE_TOKEN_STORE`: Path of the credential file
//! - `CVFORGE_LOG_LEVEL`: Default log level
//! - `CVFORGE_LOG_FORMAT`: `pretty` or `json`
//!
//! ## File Locations
//! The loader probes `cvforge.toml`, `cvforge.json`, `config.toml` and
//! `config.json` in the working directory, its two parents, and next to
//! the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use cvforge_domain::{Config, CvForgeError, LogFormat, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["cvforge.toml", "cvforge.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `CvForgeError::Config` if no source yields a valid configuration.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only the base URL is required; every other section keeps its defaults
/// unless overridden.
///
/// # Errors
/// Returns `CvForgeError::Config` if the base URL is missing or a variable
/// has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    config.api.base_url = env_var("CVFORGE_API_BASE_URL")?;

    if let Some(secs) = env_parse::<u64>("CVFORGE_REQUEST_TIMEOUT_SECS")? {
        config.api.request_timeout_secs = secs;
    }
    if let Some(retries) = env_parse::<u32>("CVFORGE_MAX_RETRIES")? {
        config.resilience.max_retries = retries;
    }
    if let Some(raw) = env_opt("CVFORGE_BACKOFF_MS") {
        config.resilience.backoff_ms = parse_backoff(&raw)?;
    }
    if let Some(interval) = env_parse::<u64>("CVFORGE_POLL_INTERVAL_MS")? {
        config.jobs.poll_interval_ms = interval;
    }
    if let Some(attempts) = env_parse::<u32>("CVFORGE_JOB_MAX_ATTEMPTS")? {
        config.jobs.max_attempts = attempts;
    }
    if let Some(path) = env_opt("CVFORGE_TOKEN_STORE") {
        config.session.token_store_path = PathBuf::from(path);
    }
    if let Some(level) = env_opt("CVFORGE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = env_opt("CVFORGE_LOG_FORMAT") {
        config.logging.format = match format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(CvForgeError::Config(format!("Invalid log format: {other}")));
            }
        };
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `CvForgeError::Config` if the file is missing, malformed, or
/// fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CvForgeError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CvForgeError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CvForgeError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

// Format is detected by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CvForgeError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CvForgeError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CvForgeError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    probe_in(&roots)
}

fn probe_in(roots: &[PathBuf]) -> Option<PathBuf> {
    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.is_file())
}

fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        CvForgeError::Config(format!("Missing required environment variable: {key}"))
    })
}

// Unset and blank values are treated alike.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| CvForgeError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

fn parse_backoff(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .map_err(|e| CvForgeError::Config(format!("Invalid backoff delay '{part}': {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Duration;

    use tempfile::{Builder, TempDir};

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: [&str; 9] = [
        "CVFORGE_API_BASE_URL",
        "CVFORGE_REQUEST_TIMEOUT_SECS",
        "CVFORGE_MAX_RETRIES",
        "CVFORGE_BACKOFF_MS",
        "CVFORGE_POLL_INTERVAL_MS",
        "CVFORGE_JOB_MAX_ATTEMPTS",
        "CVFORGE_TOKEN_STORE",
        "CVFORGE_LOG_LEVEL",
        "CVFORGE_LOG_FORMAT",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_env_with_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        clear_env();

        std::env::set_var("CVFORGE_API_BASE_URL", "https://api.example.com");
        std::env::set_var("CVFORGE_MAX_RETRIES", "1");
        std::env::set_var("CVFORGE_BACKOFF_MS", "10, 20");
        std::env::set_var("CVFORGE_POLL_INTERVAL_MS", "500");
        std::env::set_var("CVFORGE_TOKEN_STORE", "/tmp/cvforge-tokens.json");
        std::env::set_var("CVFORGE_LOG_FORMAT", "JSON");

        let config = load_from_env().unwrap();
        clear_env();

        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.resilience.max_retries, 1);
        assert_eq!(config.resilience.backoff_ms, vec![10, 20]);
        assert_eq!(config.jobs.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.jobs.max_attempts, 60);
        assert_eq!(config.session.token_store_path, PathBuf::from("/tmp/cvforge-tokens.json"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_from_env_requires_base_url() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, CvForgeError::Config(msg) if msg.contains("CVFORGE_API_BASE_URL")));
    }

    #[test]
    fn test_load_from_env_rejects_invalid_values() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        clear_env();

        std::env::set_var("CVFORGE_API_BASE_URL", "https://api.example.com");
        std::env::set_var("CVFORGE_MAX_RETRIES", "many");
        assert!(matches!(load_from_env(), Err(CvForgeError::Config(_))));

        std::env::remove_var("CVFORGE_MAX_RETRIES");
        std::env::set_var("CVFORGE_JOB_MAX_ATTEMPTS", "0");
        assert!(load_from_env().is_err(), "validation should reject a zero poll budget");

        clear_env();
    }

    fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_from_file_toml() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "cvforge.toml",
            r#"
[api]
base_url = "https://api.example.com"

[resilience]
max_retries = 5
"#,
        );

        let config = load_from_file(Some(path)).unwrap();
        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.resilience.max_retries, 5);
        assert_eq!(config.resilience.failure_threshold, 5);
    }

    #[test]
    fn test_load_from_file_json() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "config.json",
            r#"{ "api": { "base_url": "http://localhost:9000" }, "jobs": { "max_attempts": 10 } }"#,
        );

        let config = load_from_file(Some(path)).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.jobs.max_attempts, 10);
    }

    #[test]
    fn test_load_from_file_validates() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cvforge.toml", "[api]\nbase_url = \"\"\n");
        assert!(matches!(load_from_file(Some(path)), Err(CvForgeError::Config(_))));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/cvforge.toml")));
        assert!(matches!(result, Err(CvForgeError::Config(_))));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let file = Builder::new().suffix(".json").tempfile().unwrap();
        std::fs::write(file.path(), r#"{ "this is": "not valid json" "#).unwrap();
        assert!(load_from_file(Some(file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_probe_prefers_cvforge_names_and_nearest_root() {
        let outer = TempDir::new().unwrap();
        let inner = TempDir::new_in(outer.path()).unwrap();
        write_config(&outer, "cvforge.toml", "");
        write_config(&inner, "config.json", "{}");
        write_config(&inner, "cvforge.json", "{}");

        let roots = vec![inner.path().to_path_buf(), outer.path().to_path_buf()];
        assert_eq!(probe_in(&roots), Some(inner.path().join("cvforge.json")));
        assert_eq!(probe_in(&roots[1..]), Some(outer.path().join("cvforge.toml")));
        assert_eq!(probe_in(&[]), None);
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", Path::new("cvforge.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_parse_backoff() {
        assert_eq!(parse_backoff("1000,2000, 4000").unwrap(), vec![1_000, 2_000, 4_000]);
        assert!(parse_backoff("fast").is_err());
    }
}
