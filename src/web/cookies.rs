use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::session::Session;
use crate::types::UserId;

pub(super) const TOKEN_COOKIE_NAME: &str = "user_token";
pub(super) const USER_COOKIE_NAME: &str = "user_id";
// Only written when the API issued a separate refresh token.
pub(super) const REFRESH_COOKIE_NAME: &str = "user_refresh";

/// Cookies holding the session's credentials, all with the same lifetime.
pub(super) fn credential_cookies(
    session: &Session,
    ttl: std::time::Duration,
    secure: bool,
) -> Vec<Cookie<'static>> {
    let max_age = Duration::try_from(ttl).unwrap_or(Duration::HOUR);
    let build = |name: &'static str, value: String| {
        Cookie::build((name, value))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(max_age)
            .build()
    };

    let mut cookies = vec![build(TOKEN_COOKIE_NAME, session.access_token.clone())];
    if let Some(user_id) = &session.user_id {
        cookies.push(build(USER_COOKIE_NAME, user_id.to_string()));
    }
    if let Some(refresh) = session.refresh_token.as_ref().filter(|t| !t.is_empty()) {
        cookies.push(build(REFRESH_COOKIE_NAME, refresh.clone()));
    }
    cookies
}

/// Removal cookies for every credential; they are always cleared together.
pub(super) fn removal_cookies() -> [Cookie<'static>; 3] {
    [TOKEN_COOKIE_NAME, USER_COOKIE_NAME, REFRESH_COOKIE_NAME].map(|name| {
        Cookie::build((name, ""))
            .path("/")
            .max_age(Duration::ZERO)
            .build()
    })
}

pub(super) fn store_session(
    jar: PrivateCookieJar,
    session: &Session,
    ttl: std::time::Duration,
    secure: bool,
) -> PrivateCookieJar {
    credential_cookies(session, ttl, secure)
        .into_iter()
        .fold(jar, |jar, cookie| jar.add(cookie))
}

/// Rewrites the credentials a refresh replaces. `user_id` is left alone so
/// the login-time validity window still applies to it.
pub(super) fn store_refreshed(
    jar: PrivateCookieJar,
    session: &Session,
    ttl: std::time::Duration,
    secure: bool,
) -> PrivateCookieJar {
    credential_cookies(session, ttl, secure)
        .into_iter()
        .filter(|cookie| cookie.name() != USER_COOKIE_NAME)
        .fold(jar, |jar, cookie| jar.add(cookie))
}

pub(super) fn clear_session(jar: PrivateCookieJar) -> PrivateCookieJar {
    removal_cookies()
        .into_iter()
        .fold(jar, |jar, cookie| jar.remove(cookie))
}

/// Restores a session from the jar. Both the token and the user id must be present.
pub(super) fn read_session(jar: &PrivateCookieJar) -> Option<Session> {
    let token = jar
        .get(TOKEN_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())?;
    let user_id = jar.get(USER_COOKIE_NAME).map(|c| c.value().to_string())?;

    let mut session = Session::new(token).with_user_id(UserId(user_id));
    session.refresh_token = jar.get(REFRESH_COOKIE_NAME).map(|c| c.value().to_string());
    Some(session)
}
