use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::{WebConfig, WebSettings};
use crate::client::SessionClient;
use crate::config::ClientConfig;
use crate::session::SessionHandle;
use crate::transport::{HttpTransport, Transport};

/// Shared state for the auth routes and the [`ApiSession`](super::ApiSession) extractor.
pub struct WebState<T = HttpTransport> {
    pub(super) transport: Arc<T>,
    pub(super) client: Arc<ClientConfig>,
    pub(super) settings: WebSettings,
}

impl<T: Transport> WebState<T> {
    #[must_use]
    pub fn new(config: WebConfig, transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            client: Arc::new(config.client),
            settings: config.settings,
        }
    }

    /// A client bound to `session`, sharing this state's transport.
    pub(super) fn client_for(&self, session: SessionHandle) -> SessionClient<Arc<T>> {
        SessionClient::new(self.transport.clone(), session)
            .with_credential_ttl(self.client.credential_ttl())
    }
}

impl WebState<HttpTransport> {
    /// State backed by the reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the HTTP client cannot be built.
    pub fn from_config(config: WebConfig) -> Result<Self, crate::Error> {
        let transport = HttpTransport::new(&config.client)?;
        Ok(Self::new(config, transport))
    }
}

// Manual Clone: avoid derive adding a `T: Clone` bound.
impl<T> Clone for WebState<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            client: self.client.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<T> FromRef<WebState<T>> for Key {
    fn from_ref(state: &WebState<T>) -> Self {
        state.settings.cookie_key.clone()
    }
}
