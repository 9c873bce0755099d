//! Port interfaces for the session lifecycle
//!
//! These traits define the boundaries between the session manager and the
//! storage / UI layers that host it.

use async_trait::async_trait;
use cvforge_domain::{CredentialPair, Result, SessionState};

/// Durable storage for the credential pair
///
/// Implementations persist both tokens together and clear them together.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the stored credential pair, if any
    async fn load(&self) -> Result<Option<CredentialPair>>;

    /// Replace the stored credential pair
    async fn save(&self, credentials: &CredentialPair) -> Result<()>;

    /// Remove both tokens
    async fn clear(&self) -> Result<()>;
}

/// Receives session lifecycle notifications
///
/// `on_session_expired` is where a UI host navigates to its login view.
pub trait SessionListener: Send + Sync {
    /// Called once after a failed refresh purged the credentials
    fn on_session_expired(&self);

    /// Called on every state transition
    fn on_state_change(&self, _state: SessionState) {}
}
