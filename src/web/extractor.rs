use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;

use super::cookies;
use super::error::{self, LoginRequired};
use super::state::WebState;
use crate::client::SessionClient;
use crate::error::Error;
use crate::session::{Session, SessionHandle};
use crate::transport::{HttpTransport, Transport};

/// Authenticated API access for one request, restored from the credential cookies.
///
/// Rejects with [`LoginRequired`] (a redirect to the configured login page)
/// when the cookies are missing. Finish the handler with
/// [`respond`](Self::respond) so a refreshed token reaches the browser and
/// login errors redirect to the configured login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn bottles(api: ApiSession) -> Response {
///     let overview = api.client().bottle_overview().await.map(Json);
///     api.respond(overview).await
/// }
/// ```
pub struct ApiSession<T = HttpTransport> {
    client: SessionClient<Arc<T>>,
    restored: Session,
    jar: PrivateCookieJar,
    state: WebState<T>,
}

impl<T: Transport> ApiSession<T> {
    #[must_use]
    pub fn client(&self) -> &SessionClient<Arc<T>> {
        &self.client
    }

    /// Writes credential changes back to the jar.
    ///
    /// A refreshed token is stored with a fresh lifetime; `user_id` keeps the
    /// lifetime it got at login. A torn-down session clears every credential
    /// cookie. An unchanged session writes nothing.
    pub async fn persist(self) -> PrivateCookieJar {
        match self.client.session().snapshot().await {
            Some(session) if credentials_changed(&self.restored, &session) => {
                cookies::store_refreshed(
                    self.jar,
                    &session,
                    self.state.client.credential_ttl(),
                    self.state.settings.secure_cookies,
                )
            }
            Some(_) => self.jar,
            None => cookies::clear_session(self.jar),
        }
    }

    /// Turns a handler result into a response.
    ///
    /// `Ok` bodies go out with the persisted jar. Errors are rendered like
    /// [`Error`]'s own response, except that login redirects use the
    /// configured login page.
    pub async fn respond<R: IntoResponse>(self, result: Result<R, Error>) -> Response {
        match result {
            Ok(body) => (self.persist().await, body).into_response(),
            Err(e) => error::render(e, &self.state.settings.login_page),
        }
    }
}

fn credentials_changed(restored: &Session, current: &Session) -> bool {
    restored.access_token != current.access_token
        || restored.refresh_token != current.refresh_token
}

impl<T: Transport> FromRequestParts<WebState<T>> for ApiSession<T> {
    type Rejection = LoginRequired;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &WebState<T>,
    ) -> Result<Self, Self::Rejection> {
        let login_required = || LoginRequired::new(&state.settings.login_page);

        let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| login_required())?;

        let session = cookies::read_session(&jar).ok_or_else(login_required)?;

        Ok(Self {
            client: state.client_for(SessionHandle::new(session.clone())),
            restored: session,
            jar,
            state: state.clone(),
        })
    }
}
