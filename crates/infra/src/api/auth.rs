//! Auth-exempt API calls
//!
//! Login, registration, password reset and token refresh go through their
//! own executor. That executor's client keeps cookies and never attaches a
//! bearer token, so a stale credential can never reach the backend's auth
//! middleware on these endpoints.

use cvforge_domain::{
    ApiConfig, CredentialPair, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    SessionConfig,
};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use super::errors::{ApiError, EnhancedError};
use crate::http::{ApiResponse, RequestExecutor, RequestOptions};

/// Client for endpoints that must not carry a bearer token
#[derive(Clone, Debug)]
pub struct AuthClient {
    executor: RequestExecutor,
    api: ApiConfig,
    session: SessionConfig,
}

impl AuthClient {
    /// `executor` should be built with a cookie store and is never given an
    /// `Authorization` header.
    pub fn new(executor: RequestExecutor, api: ApiConfig, session: SessionConfig) -> Self {
        Self { executor, api, session }
    }

    pub fn refresh_url(&self) -> String {
        self.api.url(&self.session.refresh_path)
    }

    pub fn login_url(&self) -> String {
        self.api.url(&self.session.login_path)
    }

    /// Exchange username and password for a credential pair.
    #[instrument(skip_all, fields(username = %username))]
    pub async fn login(&self, username: &str, password: &str) -> Result<CredentialPair, EnhancedError> {
        let url = self.login_url();
        let body = to_body(
            &LoginRequest { username: username.to_string(), password: password.to_string() },
            &url,
        )?;

        let response = self.post(&url, &body).await?;
        let tokens: LoginResponse = decode(response, &url)?;
        info!("Login succeeded");
        Ok(tokens.into())
    }

    /// Create an account; the backend's response is returned verbatim.
    #[instrument(skip_all)]
    pub async fn register(&self, registration: &Value) -> Result<Value, EnhancedError> {
        let url = self.api.url(&self.session.register_path);
        Ok(self.post(&url, registration).await?.body)
    }

    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), EnhancedError> {
        let url = self.api.url(&self.session.password_reset_path);
        self.post(&url, &json!({ "email": email })).await?;
        Ok(())
    }

    /// `POST {refresh_path}` with `{ refresh }`.
    ///
    /// Sent exactly once: a refresh failure ends the session and is never
    /// retried.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, EnhancedError> {
        let url = self.refresh_url();
        let body = to_body(&RefreshRequest { refresh: refresh_token.to_string() }, &url)?;
        let options = RequestOptions::default().no_cache().max_retries(0);

        debug!(url = %url, "Refreshing access token");
        let response = self.executor.execute(Method::POST, &url, Some(&body), &options).await?;
        decode(response, &url)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<ApiResponse, EnhancedError> {
        self.executor.execute(Method::POST, url, Some(body), &RequestOptions::default().no_cache()).await
    }
}

fn to_body<T: serde::Serialize>(payload: &T, url: &str) -> Result<Value, EnhancedError> {
    serde_json::to_value(payload)
        .map_err(|err| EnhancedError::new(ApiError::Decode(err.to_string()), "POST", url, 0))
}

fn decode<T: serde::de::DeserializeOwned>(response: ApiResponse, url: &str) -> Result<T, EnhancedError> {
    response.into_json().map_err(|err| EnhancedError::new(err, "POST", url, 1))
}

#[cfg(test)]
mod tests {
    use cvforge_common::{CircuitConfig, ResilienceRegistry};
    use cvforge_domain::Config;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> AuthClient {
        let mut config = Config::default();
        config.api.base_url = server.uri();
        config.resilience.backoff_ms = vec![1];
        let registry =
            ResilienceRegistry::new(CircuitConfig::default(), config.resilience.cache_ttl(), 16);
        let executor = RequestExecutor::from_config(&config, registry, true).unwrap();
        AuthClient::new(executor, config.api, config.session)
    }

    #[tokio::test]
    async fn login_posts_credentials_without_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/"))
            .and(body_json(json!({"username": "ada", "password": "hunter2"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access": "a1", "refresh": "r1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let pair = client(&server).login("ada", "hunter2").await.unwrap();
        assert_eq!(pair, CredentialPair::new("a1", "r1"));

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn refresh_is_sent_once_even_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).refresh("r1").await.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn cookies_from_login_are_sent_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "csrftoken=abc; Path=/")
                    .set_body_json(json!({"access": "a1", "refresh": "r1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/password-reset/"))
            .and(header_exists("cookie"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let auth = client(&server);
        auth.login("ada", "pw").await.unwrap();
        auth.request_password_reset("ada@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn register_returns_backend_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
            .mount(&server)
            .await;

        let created = client(&server).register(&json!({"email": "ada@example.com"})).await.unwrap();
        assert_eq!(created["id"], 7);
    }
}
