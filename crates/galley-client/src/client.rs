//! Platform API client implementation.

use crate::api::NodeApi;
use galley_core::AttestError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client as HttpClient, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Versioned media type of the node agent API
pub const CONTENT_TYPE_V1: &str = "application/vnd.galley-node-agent.v1+json";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// User-Agent the platform recognises agents by
const DEFAULT_USER_AGENT: &str = "Galley Node Agent";

/// Client for the Galley platform API.
///
/// A client built from an empty base URL is *unconfigured*: reads fail with
/// [`AttestError::NotConfigured`] and reports succeed without a request.
#[derive(Clone)]
pub struct PlatformClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: HttpClient,
    base_url: String,
}

impl PlatformClient {
    /// Create a client for `base_url` using default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self, AttestError> {
        PlatformClientBuilder::new(base_url).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> PlatformClientBuilder {
        PlatformClientBuilder::new(base_url)
    }

    /// Returns false when no platform is configured (air-gapped or dry runs)
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.inner.base_url.is_empty()
    }

    /// Normalised base URL, empty when unconfigured
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Access vessel engine node endpoints
    #[must_use]
    pub fn node(&self) -> NodeApi<'_> {
        NodeApi::new(self)
    }

    /// Perform an authenticated GET request
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        bearer: &str,
    ) -> Result<T, AttestError> {
        let body = self.send(Method::GET, path, bearer, None::<&()>).await?;
        serde_json::from_str(&body).map_err(AttestError::MalformedResponse)
    }

    /// Perform an authenticated PATCH request with a JSON body
    pub(crate) async fn patch<B: Serialize>(
        &self,
        path: &str,
        bearer: &str,
        body: &B,
    ) -> Result<(), AttestError> {
        self.send(Method::PATCH, path, bearer, Some(body)).await.map(drop)
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        bearer: &str,
        body: Option<&B>,
    ) -> Result<String, AttestError> {
        if !self.is_configured() {
            return Err(AttestError::NotConfigured);
        }

        let url = format!("{}{}", self.inner.base_url, path);
        debug!(url = %url, method = %method, "platform request");

        let mut builder = self.inner.http.request(method, &url).bearer_auth(bearer);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let mut request = builder
            .build()
            .map_err(|e| AttestError::ClientSetup(Box::new(e)))?;
        // json() sets application/json; the platform routes on the versioned type
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_V1));

        let response = self.inner.http.execute(request).await.map_err(|e| AttestError::Unreachable {
            url: url.clone(),
            source: Box::new(e),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AttestError::Unreachable {
            url: url.clone(),
            source: Box::new(e),
        })?;

        if status != reqwest::StatusCode::OK {
            debug!(url = %url, status = status.as_u16(), "platform rejected request");
            return Err(AttestError::UnexpectedStatus {
                code: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring a [`PlatformClient`]
pub struct PlatformClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl PlatformClientBuilder {
    /// Create a new builder for the given platform base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Build the client
    pub fn build(self) -> Result<PlatformClient, AttestError> {
        let base_url = normalize_base_url(&self.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_V1));
        headers.insert(ACCEPT, HeaderValue::from_static(CONTENT_TYPE_V1));

        let http = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| AttestError::ClientSetup(Box::new(e)))?;

        Ok(PlatformClient {
            inner: Arc::new(ClientInner { http, base_url }),
        })
    }
}

/// Turn a configured platform URL into a request base.
///
/// Bare hosts such as `api.galley.run` get an `https://` scheme; trailing
/// slashes are dropped. An empty (or blank) URL stays empty.
fn normalize_base_url(raw: &str) -> Result<String, AttestError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = url::Url::parse(&candidate).map_err(|e| AttestError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AttestError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }

    Ok(candidate)
}
