//! Tracing subscriber setup
//!
//! The filter comes from `RUST_LOG` when set, otherwise from
//! [`LoggingConfig`]: the default level plus one directive per component.
//! Components are module paths under `cvforge_infra` unless they name a
//! crate explicitly (`cvforge_core=debug`).

use cvforge_domain::{CvForgeError, LogFormat, LoggingConfig, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Build `EnvFilter` directives from the logging configuration.
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    let mut components: Vec<_> = config.component_levels.iter().collect();
    components.sort();
    for (component, level) in components {
        let target = if component.starts_with("cvforge") {
            component.clone()
        } else {
            format!("cvforge_infra::{component}")
        };
        filter_str.push_str(&format!(",{target}={level}"));
    }

    filter_str
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed, so repeated
/// calls are harmless.
///
/// # Errors
/// Returns `CvForgeError::Config` when the configured directives are invalid.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = build_filter_directives(config);
            EnvFilter::try_new(&directives).map_err(|e| {
                CvForgeError::Config(format!("Invalid log directives '{directives}': {e}"))
            })?
        }
    };

    let installed = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    match installed {
        Ok(()) => {
            tracing::debug!(format = ?config.format, "Tracing initialized");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}
