//! Application context - dependency injection container
//!
//! Every process-wide service is constructed exactly once here and shared
//! by `Arc`. The resilience registry is the single owner of circuit and
//! cache state; both executors and the session manager receive clones of
//! the same handle.

use std::sync::Arc;

use cvforge_common::{CircuitConfig, ResilienceRegistry};
use cvforge_core::{JobOptions, JobPoller, SessionListener, TokenStore};
use cvforge_domain::{Config, Result, SessionState};
use cvforge_infra::{
    ApiClient, AuthClient, CvService, FileTokenStore, RequestExecutor, SessionManager,
};
use tracing::info;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub registry: ResilienceRegistry,
    pub auth: AuthClient,
    pub session: Arc<SessionManager>,
    pub client: ApiClient,
    pub cv: Arc<CvService>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("base_url", &self.config.api.base_url)
            .field("session", &self.session.state())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build the context with the file-backed token store from `config`.
    pub async fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn TokenStore> =
            Arc::new(FileTokenStore::new(config.session.token_store_path.clone()));
        Self::with_token_store(config, store).await
    }

    /// Build the context around a caller-supplied token store and restore
    /// any persisted session.
    ///
    /// # Errors
    /// Returns an error when the configuration is invalid, an HTTP client
    /// cannot be built, or the token store cannot be read.
    pub async fn with_token_store(config: Config, store: Arc<dyn TokenStore>) -> Result<Self> {
        config.validate()?;

        let registry = ResilienceRegistry::new(
            CircuitConfig {
                failure_threshold: config.resilience.failure_threshold,
                cooldown: config.resilience.cooldown(),
            },
            config.resilience.cache_ttl(),
            config.resilience.cache_max_entries,
        );

        // Auth-exempt endpoints get their own cookie-keeping client.
        let auth_executor = RequestExecutor::from_config(&config, registry.clone(), true)?;
        let auth = AuthClient::new(auth_executor, config.api.clone(), config.session.clone());

        let session =
            Arc::new(SessionManager::new(store, auth.clone(), registry.clone(), &config.session));
        let state = session.restore().await?;

        let executor = RequestExecutor::from_config(&config, registry.clone(), false)?;
        let client = ApiClient::new(executor, Arc::clone(&session), config.api.clone());

        let poller = JobPoller::new(JobOptions::from(&config.jobs));
        let cv = Arc::new(CvService::new(client.clone(), poller, config.jobs.clone()));

        info!(base_url = %config.api.base_url, session = %state, "Application context ready");

        Ok(Self { config, registry, auth, session, client, cv })
    }

    /// Install the hook invoked when a failed refresh forces a logout.
    pub fn on_session_expired(&self, listener: Arc<dyn SessionListener>) {
        self.session.set_listener(listener);
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }
}
