use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::types::UserId;

/// Credentials for one authenticated user.
///
/// `expiry` is only a local hint: the API's 401 is what decides whether the
/// access token is still good.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: Option<UserId>,
    pub expiry: Option<OffsetDateTime>,
}

impl Session {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            user_id: None,
            expiry: None,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, expiry: OffsetDateTime) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Credential presented to the refresh endpoint. Falls back to the access
    /// token when the API never issued a separate refresh token.
    #[must_use]
    pub fn refresh_credential(&self) -> &str {
        self.refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.access_token)
    }

    /// Whether the local expiry hint has passed. Never used to skip a request.
    #[must_use]
    pub fn is_past_expiry(&self, now: OffsetDateTime) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Shared, injectable holder of the current [`Session`].
///
/// Cloning is cheap and every clone sees the same session. Replacing the
/// access token is atomic: calls that start after the replacement completes
/// see the new token.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: RwLock<Option<Session>>,
    // Held for the duration of a refresh so concurrent 401s share one refresh.
    refresh_gate: Mutex<()>,
}

impl SessionHandle {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Some(session)),
                refresh_gate: Mutex::new(()),
            }),
        }
    }

    /// A handle with no session; every call fails with `NotAuthenticated`
    /// until [`install`](Self::install) is called.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Option<Session> {
        self.inner.state.read().await.clone()
    }

    /// Current access token, if a non-empty one is held.
    pub async fn access_token(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .filter(|t| !t.is_empty())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.access_token().await.is_some()
    }

    /// Replaces the whole session (login).
    pub async fn install(&self, session: Session) {
        *self.inner.state.write().await = Some(session);
    }

    /// Swaps in a freshly minted access token, keeping the rest of the session.
    ///
    /// Returns `false` if the session was cleared in the meantime, in which
    /// case nothing is stored.
    pub async fn replace_access_token(
        &self,
        access_token: String,
        refresh_token: Option<String>,
    ) -> bool {
        let mut state = self.inner.state.write().await;
        let Some(session) = state.as_mut() else {
            return false;
        };
        session.access_token = access_token;
        if let Some(refresh_token) = refresh_token {
            session.refresh_token = Some(refresh_token);
        }
        true
    }

    /// Drops all credentials (logout or permanent refresh failure).
    pub async fn clear(&self) {
        *self.inner.state.write().await = None;
    }

    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.inner.refresh_gate.lock().await
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}
