//! Session manager
//!
//! Owns the credential pair and the session state machine:
//!
//! ```text
//! Valid ──time──▶ Expired ──refresh──▶ Refreshing ──ok──▶ Valid
//!                                          └──fail──▶ Unauthenticated
//! any ──logout──▶ Unauthenticated
//! ```
//!
//! Refreshes are single-flight: concurrent callers holding the same stale
//! token queue on one lock, the first performs the refresh and the rest
//! reuse its result. A failed refresh purges both tokens, notifies the
//! [`SessionListener`] and is never retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use cvforge_common::ResilienceRegistry;
use cvforge_core::{evaluate_state, SessionListener, TokenStore};
use cvforge_domain::{CredentialPair, CvForgeError, SessionConfig, SessionState};
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tracing::{info, instrument, warn};

use super::auth::AuthClient;
use super::errors::{ApiError, EnhancedError};

pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    auth: AuthClient,
    registry: ResilienceRegistry,
    credentials: RwLock<Option<CredentialPair>>,
    refresh_lock: Mutex<()>,
    refreshing: AtomicBool,
    state_tx: watch::Sender<SessionState>,
    listener: RwLock<Option<Arc<dyn SessionListener>>>,
    leeway: chrono::Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").field("state", &self.state()).finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        auth: AuthClient,
        registry: ResilienceRegistry,
        config: &SessionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unauthenticated);
        let leeway = chrono::Duration::seconds(i64::try_from(config.expiry_leeway_secs).unwrap_or(0));
        Self {
            store,
            auth,
            registry,
            credentials: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refreshing: AtomicBool::new(false),
            state_tx,
            listener: RwLock::new(None),
            leeway,
        }
    }

    /// Install the hook that navigates to the login view on forced logout.
    pub fn set_listener(&self, listener: Arc<dyn SessionListener>) {
        *self.listener.write() = Some(listener);
    }

    /// Load persisted credentials into memory.
    pub async fn restore(&self) -> Result<SessionState, CvForgeError> {
        let loaded = self.store.load().await?;
        *self.credentials.write() = loaded;
        let state = self.state();
        info!(%state, "Session restored");
        self.publish(state);
        Ok(state)
    }

    /// Current state, evaluated locally from the access token's expiry.
    pub fn state(&self) -> SessionState {
        if self.refreshing.load(Ordering::SeqCst) {
            return SessionState::Refreshing;
        }
        evaluate_state(self.credentials.read().as_ref(), Utc::now(), self.leeway)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Current access token, expired or not.
    pub fn access_token(&self) -> Option<String> {
        self.credentials.read().as_ref().map(|pair| pair.access_token.clone())
    }

    /// Replace the credential pair in memory and in the durable store.
    pub async fn store_credentials(&self, credentials: CredentialPair) -> Result<(), CvForgeError> {
        self.store.save(&credentials).await?;
        *self.credentials.write() = Some(credentials);
        self.publish(self.state());
        Ok(())
    }

    #[instrument(skip_all, fields(username = %username))]
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionState, EnhancedError> {
        let credentials = self.auth.login(username, password).await?;
        self.store_credentials(credentials).await.map_err(|err| {
            let reason = format!("failed to persist credentials: {err}");
            EnhancedError::new(ApiError::Config(reason), "POST", self.auth.login_url(), 1)
        })?;
        Ok(self.state())
    }

    /// Explicit logout from any state.
    pub async fn logout(&self) -> Result<(), CvForgeError> {
        self.purge().await;
        info!("Logged out");
        Ok(())
    }

    /// Obtain a fresh access token to replace `stale`.
    ///
    /// If another caller already replaced `stale` while this one waited, the
    /// newer token is returned without a second refresh.
    ///
    /// # Errors
    /// Returns `ApiError::SessionExpired` when no refresh token is available
    /// or the refresh call fails; in the latter case the session is purged.
    pub async fn refresh(&self, stale: Option<&str>) -> Result<String, EnhancedError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.credentials.read().clone();
        let Some(current) = current else {
            return Err(self.expired_error("no refresh token available"));
        };
        if stale != Some(current.access_token.as_str())
            && self.state() == SessionState::Valid
        {
            return Ok(current.access_token);
        }

        self.refreshing.store(true, Ordering::SeqCst);
        self.publish(SessionState::Refreshing);
        let result = self.auth.refresh(&current.refresh_token).await;
        self.refreshing.store(false, Ordering::SeqCst);

        match result {
            Ok(tokens) => {
                let refreshed = CredentialPair::new(
                    tokens.access,
                    tokens.refresh.unwrap_or(current.refresh_token),
                );
                let access = refreshed.access_token.clone();
                if let Err(err) = self.store.save(&refreshed).await {
                    warn!(error = %err, "Failed to persist refreshed credentials");
                }
                *self.credentials.write() = Some(refreshed);
                self.publish(self.state());
                info!("Access token refreshed");
                Ok(access)
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed, ending session");
                self.purge().await;
                if let Some(listener) = self.listener.read().clone() {
                    listener.on_session_expired();
                }
                Err(EnhancedError::new(
                    ApiError::SessionExpired(err.source.to_string()),
                    "POST",
                    self.auth.refresh_url(),
                    err.attempts,
                ))
            }
        }
    }

    async fn purge(&self) {
        *self.credentials.write() = None;
        if let Err(err) = self.store.clear().await {
            warn!(error = %err, "Failed to clear persisted credentials");
        }
        self.registry.cache().clear();
        self.publish(SessionState::Unauthenticated);
    }

    fn publish(&self, state: SessionState) {
        let changed = self.state_tx.send_replace(state) != state;
        if changed {
            if let Some(listener) = self.listener.read().clone() {
                listener.on_state_change(state);
            }
        }
    }

    fn expired_error(&self, reason: &str) -> EnhancedError {
        EnhancedError::new(ApiError::SessionExpired(reason.to_string()), "POST", self.auth.refresh_url(), 0)
    }
}
