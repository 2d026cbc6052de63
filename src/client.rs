use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::api_error::{self, ErrorDetail};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::models::{NewUser, User};
use crate::session::{Session, SessionHandle};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::types::UserId;

const TOKENS_PATH: &str = "/tokens";
const REFRESH_PATH: &str = "/refresh";
const USERS_PATH: &str = "/users";

/// Authenticated client for the inventory API.
///
/// Every protected call carries the session's bearer token. When the API
/// answers 401, the client refreshes the token once and replays the original
/// request once; if the refresh itself fails, the session is cleared and the
/// call returns [`Error::SessionExpired`].
///
/// ```rust,ignore
/// use cellar_client::{ClientConfig, SessionClient};
///
/// let client = SessionClient::from_config(&ClientConfig::from_env()?)?;
/// client.login("alice@example.com", "secret").await?;
/// let cellars = client.get("/cellars").await?;
/// ```
pub struct SessionClient<T = HttpTransport> {
    transport: T,
    session: SessionHandle,
    credential_ttl: Duration,
}

/// Body of `POST /tokens` and `POST /refresh`.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user_id: Option<UserId>,
}

impl TokenGrant {
    fn from_body(body: &str) -> Option<Self> {
        serde_json::from_str::<Self>(body)
            .ok()
            .filter(|grant| grant.token.as_deref().is_some_and(|t| !t.is_empty()))
    }
}

impl SessionClient<HttpTransport> {
    /// reqwest-backed client with an empty session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        Ok(Self::new(HttpTransport::new(config)?, SessionHandle::empty())
            .with_credential_ttl(config.credential_ttl()))
    }
}

impl<T: Transport> SessionClient<T> {
    #[must_use]
    pub fn new(transport: T, session: SessionHandle) -> Self {
        Self {
            transport,
            session,
            credential_ttl: ClientConfig::DEFAULT_CREDENTIAL_TTL,
        }
    }

    /// Bind the client to an existing session (e.g. one restored from cookies).
    #[must_use]
    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = session;
        self
    }

    #[must_use]
    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl = ttl;
        self
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Executes one logical authenticated request.
    ///
    /// Non-401 responses are returned as-is, whatever their status; use
    /// [`ApiResponse::into_result`] to treat non-2xx as an error.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAuthenticated`] if no access token is held (nothing is sent).
    /// - [`Error::Transport`] if a request gets no response.
    /// - [`Error::SessionExpired`] if the token was rejected and could not be refreshed.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<ApiResponse, Error> {
        let token = self
            .session
            .access_token()
            .await
            .ok_or(Error::NotAuthenticated)?;

        let request = ApiRequest::new(method, path).with_body(body);
        let response = self
            .transport
            .send(request.clone().with_bearer(token.as_str()))
            .await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(method = %request.method, path, "access token rejected");
        let fresh = self.refresh(&token).await?;

        // The replay's outcome is final, even another 401.
        let response = self.transport.send(request.with_bearer(fresh)).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            tracing::warn!(path, "request rejected again after token refresh");
        }
        Ok(response)
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, Error> {
        self.call(Method::GET, path, None).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, Error> {
        self.call(Method::POST, path, Some(encode(body)?)).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, Error> {
        self.call(Method::PUT, path, Some(encode(body)?)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, Error> {
        self.call(Method::DELETE, path, None).await
    }

    /// Returns a usable access token after `stale` was rejected, refreshing at
    /// most once. Concurrent callers that failed with the same token wait for
    /// a single refresh and share its result.
    async fn refresh(&self, stale: &str) -> Result<String, Error> {
        let _gate = self.session.lock_refresh().await;

        let Some(session) = self.session.snapshot().await else {
            return Err(Error::SessionExpired);
        };
        if !session.access_token.is_empty() && session.access_token != stale {
            tracing::debug!("token already refreshed by a concurrent call");
            return Ok(session.access_token);
        }

        match self.request_new_token(&session).await {
            Ok(grant) => {
                let token = grant.token.unwrap_or_default();
                if self
                    .session
                    .replace_access_token(token.clone(), grant.refresh_token)
                    .await
                {
                    tracing::info!("access token refreshed");
                    Ok(token)
                } else {
                    Err(Error::SessionExpired)
                }
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, "token refresh failed, clearing session");
                self.session.clear().await;
                Err(Error::SessionExpired)
            }
        }
    }

    async fn request_new_token(&self, session: &Session) -> Result<TokenGrant, String> {
        let credential = session.refresh_credential();
        let body = serde_json::json!({ "refresh_token": credential }).to_string();
        let request = ApiRequest::new(Method::POST, REFRESH_PATH)
            .with_bearer(credential)
            .with_body(Some(body));

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| format!("transport: {e}"))?;
        if !response.is_success() {
            let detail = api_error::parse_error_body(response.status.as_u16(), &response.body);
            return Err(format!("status {}: {detail}", response.status.as_u16()));
        }
        TokenGrant::from_body(&response.body).ok_or_else(|| "response carried no token".into())
    }

    /// Exchanges credentials for a token and installs the resulting session.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if the API is unreachable.
    /// - [`Error::Upstream`] if no token was issued; the detail carries the
    ///   API's message, or "invalid email or password".
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, Error> {
        let body = serde_json::json!({ "email": email.trim(), "password": password }).to_string();
        let request = ApiRequest::new(Method::POST, TOKENS_PATH).with_body(Some(body));
        let response = self.transport.send(request).await?;

        let Some(grant) = TokenGrant::from_body(&response.body) else {
            let status = response.status.as_u16();
            tracing::info!(status, "login rejected");
            let detail = response
                .json_value()
                .ok()
                .and_then(|json| api_error::normalize(&json))
                .unwrap_or_else(|| ErrorDetail::message("invalid email or password"));
            return Err(Error::Upstream { status, detail });
        };

        let mut session = Session::new(grant.token.unwrap_or_default())
            .with_expiry(OffsetDateTime::now_utc() + self.credential_ttl);
        session.refresh_token = grant.refresh_token;
        session.user_id = grant.user_id;

        self.session.install(session.clone()).await;
        tracing::info!(user_id = ?session.user_id, "login successful");
        Ok(session)
    }

    /// Creates an account. Does not log in.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the form fails local checks (nothing is sent).
    /// - [`Error::Transport`] if the API is unreachable.
    /// - [`Error::Upstream`] if the API did not return the created user.
    pub async fn register(&self, new_user: NewUser) -> Result<User, Error> {
        let new_user = new_user.validated()?;
        let request = ApiRequest::new(Method::POST, USERS_PATH).with_body(Some(encode(&new_user)?));
        let response = self.transport.send(request).await?;
        let user = expect_created::<User>(response)?;
        tracing::info!(user_id = %user.id, "account created");
        Ok(user)
    }

    /// Forgets the local session. The API keeps no logout endpoint.
    pub async fn logout(&self) {
        self.session.clear().await;
        tracing::info!("logged out");
    }
}

/// Decodes a create/update response whose success marker is an `id` field.
pub(crate) fn expect_created<R: serde::de::DeserializeOwned>(
    response: ApiResponse,
) -> Result<R, Error> {
    let has_id = response
        .json_value()
        .ok()
        .is_some_and(|json| json.get("id").is_some_and(|id| !id.is_null()));
    if !has_id {
        return Err(response.into_upstream_error());
    }
    response.json()
}

pub(crate) fn encode<B: Serialize + ?Sized>(body: &B) -> Result<String, Error> {
    serde_json::to_string(body).map_err(|e| Error::Encode(e.to_string()))
}
