//! Authenticated API client
//!
//! Attaches the session's bearer token to every call and hides token expiry
//! from callers. A locally expired token is refreshed before the call; a 401
//! triggers one refresh and one replay. Each logical call refreshes at most
//! once, so a 401 on the replay reaches the caller unchanged.

use std::future::Future;
use std::sync::Arc;

use cvforge_domain::{ApiConfig, SessionState};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::errors::{ApiError, EnhancedError};
use super::session::SessionManager;
use crate::http::{ApiResponse, FileUpload, RequestExecutor, RequestOptions, UploadProgress};

/// API client for endpoints that require a bearer token
#[derive(Clone, Debug)]
pub struct ApiClient {
    executor: RequestExecutor,
    session: Arc<SessionManager>,
    api: ApiConfig,
}

impl ApiClient {
    pub fn new(executor: RequestExecutor, session: Arc<SessionManager>, api: ApiConfig) -> Self {
        Self { executor, session, api }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        self.api.url(path)
    }

    /// Execute one authenticated logical call.
    ///
    /// # Errors
    /// Returns the executor's [`EnhancedError`], or `SessionExpired` when the
    /// token could not be refreshed.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse, EnhancedError> {
        let url = self.api.url(path);
        let executor = &self.executor;
        let method = &method;
        let target = url.as_str();
        self.authorized(options, move |options| async move {
            executor.execute(method.clone(), target, body, &options).await
        })
        .await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, EnhancedError> {
        let response = self.request(Method::GET, path, None, RequestOptions::default()).await?;
        self.decode(response, &Method::GET, path)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, EnhancedError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, body).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, EnhancedError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PUT, path, body).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), EnhancedError> {
        self.request(Method::DELETE, path, None, RequestOptions::default().no_cache()).await?;
        Ok(())
    }

    /// Authenticated multipart upload.
    ///
    /// `progress` is shared with a refresh-triggered replay, so percentages
    /// stay monotone across both.
    #[instrument(skip_all, fields(path = %path, file = %upload.file_name))]
    pub async fn upload_file(
        &self,
        path: &str,
        upload: &FileUpload,
        extra_fields: &[(String, String)],
        progress: Option<&UploadProgress>,
        options: RequestOptions,
    ) -> Result<ApiResponse, EnhancedError> {
        let url = self.api.url(path);
        let executor = &self.executor;
        let target = url.as_str();
        self.authorized(options, move |options| async move {
            executor.upload_file(target, upload, extra_fields, progress, &options).await
        })
        .await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, EnhancedError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_value(body).map_err(|err| {
            EnhancedError::new(ApiError::Decode(err.to_string()), method.as_str(), self.api.url(path), 0)
        })?;
        let response = self
            .request(method.clone(), path, Some(&payload), RequestOptions::default().no_cache())
            .await?;
        self.decode(response, &method, path)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        response: ApiResponse,
        method: &Method,
        path: &str,
    ) -> Result<T, EnhancedError> {
        response
            .into_json()
            .map_err(|err| EnhancedError::new(err, method.as_str(), self.api.url(path), 1))
    }

    async fn authorized<F, Fut>(
        &self,
        options: RequestOptions,
        mut call: F,
    ) -> Result<ApiResponse, EnhancedError>
    where
        F: FnMut(RequestOptions) -> Fut,
        Fut: Future<Output = Result<ApiResponse, EnhancedError>>,
    {
        let mut token = self.session.access_token();
        let mut refreshed = false;

        if token.is_some() && self.session.state() == SessionState::Expired {
            debug!("Access token expired locally, refreshing before the call");
            token = Some(self.session.refresh(token.as_deref()).await?);
            refreshed = true;
        }

        match call(with_token(&options, token.as_deref())).await {
            Err(err) if err.is_unauthorized() && !refreshed && token.is_some() => {
                debug!(url = %err.url, "Unauthorized, refreshing and replaying once");
                let fresh = self.session.refresh(token.as_deref()).await?;
                call(with_token(&options, Some(&fresh))).await
            }
            outcome => outcome,
        }
    }
}

fn with_token(options: &RequestOptions, token: Option<&str>) -> RequestOptions {
    match token {
        Some(token) => options.clone().bearer(token),
        None => options.clone(),
    }
}
