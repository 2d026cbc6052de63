use axum::Json;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

use super::cookies;
use crate::api_error::ErrorDetail;
use crate::error::Error;

pub(super) const LOGIN_PAGE: &str = "/auth/login";

/// Rejection of [`ApiSession`](super::ApiSession): redirect to the configured login page.
#[derive(Debug, Clone)]
pub struct LoginRequired {
    login_page: String,
}

impl LoginRequired {
    pub(super) fn new(login_page: &str) -> Self {
        Self {
            login_page: login_page.to_owned(),
        }
    }
}

impl IntoResponse for LoginRequired {
    fn into_response(self) -> Response {
        render(Error::NotAuthenticated, &self.login_page)
    }
}

/// Renders with the default login page. Handlers behind a relocated login
/// page go through [`ApiSession::respond`](super::ApiSession::respond).
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        render(self, LOGIN_PAGE)
    }
}

/// Maps an error to a response; login-related errors redirect to `login_page`.
pub(super) fn render(error: Error, login_page: &str) -> Response {
    match error {
        Error::NotAuthenticated => Redirect::to(login_page).into_response(),
        Error::SessionExpired => {
            let mut response =
                Redirect::to(&format!("{login_page}?error=session_expired")).into_response();
            for cookie in cookies::removal_cookies() {
                if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
                    response.headers_mut().append(SET_COOKIE, value);
                }
            }
            response
        }
        Error::Transport(ref e) => {
            tracing::warn!(error = %e, "inventory API unreachable");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorDetail::message(
                    "cannot reach the inventory API, please try again later",
                )),
            )
                .into_response()
        }
        Error::Upstream { status, detail } => {
            // A 2xx without its success marker is still a failed upstream call.
            let status = StatusCode::from_u16(status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(detail)).into_response()
        }
        Error::Validation(detail) => (StatusCode::UNPROCESSABLE_ENTITY, Json(detail)).into_response(),
        Error::InvalidResponse(ref msg) => {
            tracing::error!(error = %msg, "undecodable inventory API response");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorDetail::message("invalid response from the inventory API")),
            )
                .into_response()
        }
        Error::Encode(_) | Error::Config(_) => {
            tracing::error!(error = %error, "internal error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}
