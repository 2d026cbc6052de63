use std::future::Future;
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use url::Url;

use crate::api_error;
use crate::config::ClientConfig;
use crate::error::Error;

/// One request against the inventory API, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    /// Already-serialized JSON body.
    pub body: Option<String>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            bearer: None,
            body: None,
        }
    }

    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }
}

/// A response that made it back from the API, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decodes the body as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_str(&self.body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    /// Decodes the body as loosely-typed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if the body is not valid JSON.
    pub fn json_value(&self) -> Result<JsonValue, Error> {
        self.json()
    }

    /// Keeps 2xx responses; turns anything else into [`Error::Upstream`]
    /// with the body normalized by [`api_error::parse_error_body`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] for non-2xx statuses.
    pub fn into_result(self) -> Result<Self, Error> {
        if self.is_success() {
            return Ok(self);
        }
        Err(self.into_upstream_error())
    }

    /// Converts the response into [`Error::Upstream`] regardless of status.
    #[must_use]
    pub fn into_upstream_error(self) -> Error {
        let status = self.status.as_u16();
        Error::Upstream {
            status,
            detail: api_error::parse_error_body(status, &self.body),
        }
    }
}

/// No response was received: connection refused, DNS, timeout, truncated body.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self(format!("request timed out: {e}"))
        } else {
            Self(e.to_string())
        }
    }
}

/// Sends [`ApiRequest`]s to the inventory API.
///
/// [`HttpTransport`] is the production implementation. Implement this trait
/// to put the session logic in front of something else (tests, a proxy).
pub trait Transport: Send + Sync + 'static {
    /// Sends one request. Any status code is a successful send; only a missing
    /// response is an error.
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send {
        (**self).send(request)
    }
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Builds a transport from the client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the reqwest client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self {
            base_url: config.api_url().clone(),
            http,
        })
    }

    /// Use a custom HTTP client (for connection pool reuse).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Appends `path` to the base URL, keeping any path prefix the base carries.
    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
            .parse()
            .map_err(|e| TransportError(format!("invalid endpoint '{path}': {e}")))
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.endpoint(&request.path)?;
        let mut builder = self.http.request(request.method, url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }
}
