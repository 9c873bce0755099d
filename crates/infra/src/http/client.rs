use std::time::Duration;

use cvforge_domain::{ApiConfig, CvForgeError};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use crate::api::errors::ApiError;
use crate::errors::conversions::classify_transport_error;
use crate::errors::InfraError;

/// Thin wrapper over a configured `reqwest::Client`.
///
/// Sends exactly one attempt per call; retry policy belongs to
/// [`RequestExecutor`](super::RequestExecutor).
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, CvForgeError> {
        Self::builder().build()
    }

    /// Default per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Send one attempt, classifying transport failures.
    ///
    /// `timeout` overrides the client default for this attempt only.
    pub async fn send(
        &self,
        builder: RequestBuilder,
        timeout: Option<Duration>,
    ) -> Result<Response, ApiError> {
        let timeout = timeout.unwrap_or(self.timeout);
        let request = builder
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::Config(format!("invalid request: {err}")))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(classify_transport_error(&err, timeout))
            }
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
    cookie_store: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: None, default_headers: None, cookie_store: false }
    }
}

impl HttpClientBuilder {
    /// Seed timeout and user agent from the API section of the config.
    pub fn from_config(config: &ApiConfig) -> Self {
        let builder = Self::default().timeout(config.request_timeout());
        match &config.user_agent {
            Some(agent) => builder.user_agent(agent.clone()),
            None => builder,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Keep and resend cookies; used by the auth-exempt client.
    pub fn cookie_store(mut self, enabled: bool) -> Self {
        self.cookie_store = enabled;
        self
    }

    pub fn build(self) -> Result<HttpClient, CvForgeError> {
        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).cookie_store(self.cookie_store).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| CvForgeError::from(InfraError::from(err)))?;

        Ok(HttpClient { client, timeout: self.timeout })
    }
}
