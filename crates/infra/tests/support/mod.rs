//! Shared fixtures for infra integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cvforge_common::{CircuitConfig, ResilienceRegistry};
use cvforge_core::{JobOptions, JobPoller, SessionListener};
use cvforge_domain::{Config, CredentialPair};
use cvforge_infra::{
    ApiClient, AuthClient, CvService, MemoryTokenStore, RequestExecutor, SessionManager,
};
use wiremock::MockServer;

/// Config pointed at the mock server with millisecond backoff.
pub fn test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.api.request_timeout_secs = 5;
    config.resilience.backoff_ms = vec![1, 2, 4];
    config.jobs.poll_interval_ms = 5;
    config
}

pub fn registry_for(config: &Config) -> ResilienceRegistry {
    ResilienceRegistry::new(
        CircuitConfig {
            failure_threshold: config.resilience.failure_threshold,
            cooldown: config.resilience.cooldown(),
        },
        config.resilience.cache_ttl(),
        config.resilience.cache_max_entries,
    )
}

pub fn executor(config: &Config) -> RequestExecutor {
    RequestExecutor::from_config(config, registry_for(config), false).unwrap()
}

#[derive(Default)]
pub struct RecordingListener {
    pub expired: AtomicU32,
}

impl RecordingListener {
    pub fn expired_count(&self) -> u32 {
        self.expired.load(Ordering::SeqCst)
    }
}

impl SessionListener for RecordingListener {
    fn on_session_expired(&self) {
        self.expired.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fully wired client stack sharing one registry.
pub struct Stack {
    pub config: Config,
    pub registry: ResilienceRegistry,
    pub store: Arc<MemoryTokenStore>,
    pub session: Arc<SessionManager>,
    pub listener: Arc<RecordingListener>,
    pub client: ApiClient,
    pub cv: CvService,
}

pub async fn stack(config: Config, credentials: Option<CredentialPair>) -> Stack {
    let registry = registry_for(&config);
    let store = Arc::new(match credentials {
        Some(pair) => MemoryTokenStore::with_credentials(pair),
        None => MemoryTokenStore::new(),
    });

    let auth_executor = RequestExecutor::from_config(&config, registry.clone(), true).unwrap();
    let auth = AuthClient::new(auth_executor, config.api.clone(), config.session.clone());
    let session = Arc::new(SessionManager::new(
        store.clone(),
        auth,
        registry.clone(),
        &config.session,
    ));
    let listener = Arc::new(RecordingListener::default());
    session.set_listener(listener.clone());
    session.restore().await.unwrap();

    let executor = RequestExecutor::from_config(&config, registry.clone(), false).unwrap();
    let client = ApiClient::new(executor, session.clone(), config.api.clone());
    let poller = JobPoller::new(JobOptions {
        max_attempts: config.jobs.max_attempts,
        poll_interval: Duration::from_millis(config.jobs.poll_interval_ms),
    });
    let cv = CvService::new(client.clone(), poller, config.jobs.clone());

    Stack { config, registry, store, session, listener, client, cv }
}
