use axum::Router;
use axum::extract::{Form, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use super::cookies;
use super::state::WebState;
use crate::error::Error;
use crate::models::NewUser;
use crate::session::SessionHandle;
use crate::transport::Transport;

/// Create the login/logout/register router.
pub fn auth_routes<T: Transport>(state: WebState<T>) -> Router {
    let auth_path = state.settings.auth_path.clone();

    Router::new()
        .route(&format!("{auth_path}/login"), post(login::<T>))
        .route(
            &format!("{auth_path}/logout"),
            get(logout::<T>).post(logout::<T>),
        )
        .route(&format!("{auth_path}/register"), post(register::<T>))
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

async fn login<T: Transport>(
    State(state): State<WebState<T>>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(PrivateCookieJar, Redirect), Response> {
    let client = state.client_for(SessionHandle::empty());

    let session = client
        .login(&form.email, &form.password)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "login failed");
            page_error(&state.settings.login_page, &user_message(&e))
        })?;

    let jar = cookies::store_session(
        jar,
        &session,
        state.client.credential_ttl(),
        state.settings.secure_cookies,
    );
    Ok((jar, Redirect::to(&state.settings.login_redirect)))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<T: Transport>(
    State(state): State<WebState<T>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    (
        cookies::clear_session(jar),
        Redirect::to(&state.settings.logout_redirect),
    )
}

// ── Register ───────────────────────────────────────────────────────

async fn register<T: Transport>(
    State(state): State<WebState<T>>,
    Form(form): Form<NewUser>,
) -> Result<Redirect, Response> {
    let client = state.client_for(SessionHandle::empty());

    client.register(form).await.map_err(|e| {
        tracing::info!(error = %e, "registration failed");
        page_error(&state.settings.register_page, &user_message(&e))
    })?;

    Ok(Redirect::to(&format!(
        "{}?registered=1",
        state.settings.login_page
    )))
}

// ── Helpers ────────────────────────────────────────────────────────

fn page_error(page: &str, message: &str) -> Response {
    let encoded = urlencoding::encode(message);
    Redirect::to(&format!("{page}?error={encoded}")).into_response()
}

fn user_message(error: &Error) -> String {
    match error {
        Error::Transport(_) => "api_unreachable".into(),
        other => other
            .detail()
            .map(|detail| detail.summary())
            .unwrap_or_else(|| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use axum::Json;
    use axum::body::Body;
    use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use axum_extra::extract::cookie::Key;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ClientConfig;
    use crate::testing::{MockApi, empty, reply, unreachable};
    use crate::web::{ApiSession, WebConfig};

    fn config() -> WebConfig {
        WebConfig::new(ClientConfig::new("http://api.test".parse().unwrap()))
            .with_cookie_key(Key::generate())
            .with_secure_cookies(false)
    }

    fn state(api: &MockApi) -> WebState<MockApi> {
        WebState::new(config(), api.clone())
    }

    async fn overview(api: ApiSession<MockApi>) -> Response {
        let overview = api.client().bottle_overview().await.map(Json);
        api.respond(overview).await
    }

    fn app(state: WebState<MockApi>) -> Router {
        Router::new()
            .route("/bottles", get(overview))
            .with_state(state.clone())
            .merge(auth_routes(state))
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn get_with_cookies(uri: &str, cookies: &str) -> Request<Body> {
        Request::get(uri)
            .header(COOKIE, cookies)
            .body(Body::empty())
            .unwrap()
    }

    /// `name=value` pairs from a response's `Set-Cookie` headers.
    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(str::to_owned)
            .collect()
    }

    /// `Cookie` header value built from a response's `Set-Cookie` headers.
    fn cookie_header(response: &Response) -> String {
        set_cookies(response).join("; ")
    }

    fn location(response: &Response) -> &str {
        response.headers()[LOCATION].to_str().unwrap()
    }

    async fn logged_in(app: &Router) -> Vec<String> {
        let login = app
            .clone()
            .oneshot(form_post("/auth/login", "email=a%40b.co&password=pw"))
            .await
            .unwrap();
        set_cookies(&login)
    }

    #[tokio::test]
    async fn login_sets_credential_cookies() {
        let api = MockApi::scripted(vec![reply(201, json!({"token": "tok", "user_id": 7}))]);
        let app = app(state(&api));

        let response = app
            .oneshot(form_post("/auth/login", "email=a%40b.co&password=pw"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/cellars");
        let cookies = cookie_header(&response);
        assert!(cookies.contains("user_token="));
        assert!(cookies.contains("user_id="));
        // Values are encrypted.
        assert!(!cookies.contains("user_token=tok"));
    }

    #[tokio::test]
    async fn failed_login_redirects_with_message() {
        let api = MockApi::scripted(vec![reply(401, json!({"detail": "Invalid credentials"}))]);

        let response = app(state(&api))
            .oneshot(form_post("/auth/login", "email=a%40b.co&password=bad"))
            .await
            .unwrap();

        assert_eq!(location(&response), "/auth/login?error=Invalid%20credentials");
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn unreachable_api_on_login() {
        let api = MockApi::scripted(vec![unreachable()]);

        let response = app(state(&api))
            .oneshot(form_post("/auth/login", "email=a%40b.co&password=pw"))
            .await
            .unwrap();

        assert_eq!(location(&response), "/auth/login?error=api_unreachable");
    }

    #[tokio::test]
    async fn protected_route_without_cookies_redirects_to_login() {
        let api = MockApi::scripted(vec![]);

        let response = app(state(&api))
            .oneshot(Request::get("/bottles").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(location(&response), "/auth/login");
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn relocated_login_page_is_used_for_redirects() {
        let api = MockApi::scripted(vec![
            reply(201, json!({"token": "old", "user_id": 7})),
            empty(401),
            reply(401, json!({"message": "invalid refresh"})),
        ]);
        let config = config()
            .with_auth_path("/account")
            .with_login_page("/account/login");
        let app = app(WebState::new(config, api.clone()));

        let anonymous = app
            .clone()
            .oneshot(Request::get("/bottles").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(location(&anonymous), "/account/login");

        let login = app
            .clone()
            .oneshot(form_post("/account/login", "email=a%40b.co&password=pw"))
            .await
            .unwrap();
        let expired = app
            .oneshot(get_with_cookies("/bottles", &cookie_header(&login)))
            .await
            .unwrap();
        assert_eq!(location(&expired), "/account/login?error=session_expired");
    }

    #[tokio::test]
    async fn refreshed_token_is_written_back() {
        let api = MockApi::scripted(vec![
            reply(201, json!({"token": "old", "user_id": 7})),
            empty(401),
            reply(200, json!({"token": "new"})),
            reply(200, json!([])),
            reply(200, json!([])),
        ]);
        let app = app(state(&api));
        let login_cookies = logged_in(&app).await;

        let first = app
            .clone()
            .oneshot(get_with_cookies("/bottles", &login_cookies.join("; ")))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let refreshed = set_cookies(&first);
        assert_eq!(refreshed.len(), 1);
        assert!(refreshed[0].starts_with("user_token="));

        // The browser keeps the login-time user_id and takes the new token.
        let user_id = login_cookies
            .iter()
            .find(|c| c.starts_with("user_id="))
            .unwrap();
        let second = app
            .oneshot(get_with_cookies(
                "/bottles",
                &format!("{}; {user_id}", refreshed[0]),
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);

        let requests = api.requests();
        assert_eq!(requests[1].bearer.as_deref(), Some("old"));
        assert_eq!(requests[3].bearer.as_deref(), Some("new"));
        assert_eq!(requests[4].bearer.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn unchanged_session_keeps_cookie_lifetime() {
        let api = MockApi::scripted(vec![
            reply(201, json!({"token": "tok", "user_id": 7})),
            reply(200, json!([])),
        ]);
        let app = app(state(&api));
        let cookies = logged_in(&app).await.join("; ");

        let response = app
            .oneshot(get_with_cookies("/bottles", &cookies))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn expired_session_clears_cookies() {
        let api = MockApi::scripted(vec![
            reply(201, json!({"token": "old", "user_id": 7})),
            empty(401),
            reply(401, json!({"message": "invalid refresh"})),
        ]);
        let app = app(state(&api));
        let cookies = logged_in(&app).await.join("; ");

        let response = app
            .oneshot(get_with_cookies("/bottles", &cookies))
            .await
            .unwrap();

        assert_eq!(location(&response), "/auth/login?error=session_expired");
        let cleared = cookie_header(&response);
        assert!(cleared.contains("user_token="));
        assert!(cleared.contains("user_id="));
    }

    #[tokio::test]
    async fn missing_id_on_success_is_bad_gateway() {
        let api = MockApi::scripted(vec![
            reply(201, json!({"token": "tok", "user_id": 7})),
            reply(200, json!({"message": "no id"})),
        ]);
        let state = state(&api);

        async fn rename(api: ApiSession<MockApi>) -> Response {
            let form = crate::models::CellarForm {
                name: "Cave".into(),
                location: String::new(),
                capacity: 10,
            };
            let cellar = api
                .client()
                .update_cellar(&"c1".into(), form)
                .await
                .map(Json);
            api.respond(cellar).await
        }
        let app = Router::new()
            .route("/rename", post(rename))
            .with_state(state.clone())
            .merge(auth_routes(state));
        let cookies = logged_in(&app).await.join("; ");

        let response = app
            .oneshot(
                Request::post("/rename")
                    .header(COOKIE, cookies)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn logout_clears_cookies() {
        let api = MockApi::scripted(vec![]);

        let response = app(state(&api))
            .oneshot(Request::post("/auth/logout").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(location(&response), "/auth/login");
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn register_redirects_to_login() {
        let api = MockApi::scripted(vec![
            reply(201, json!({"id": 3, "email": "a@b.co", "username": "al"})),
        ]);

        let response = app(state(&api))
            .oneshot(form_post(
                "/auth/register",
                "email=a%40b.co&username=al&password=pw",
            ))
            .await
            .unwrap();

        assert_eq!(location(&response), "/auth/login?registered=1");
        assert_eq!(api.requests()[0].path, "/users");
    }

    #[tokio::test]
    async fn register_errors_stay_on_register_page() {
        let api = MockApi::scripted(vec![reply(
            400,
            json!({"message": "Email already registered"}),
        )]);
        let app = app(state(&api));

        let invalid = app
            .clone()
            .oneshot(form_post(
                "/auth/register",
                "email=nope&username=al&password=pw",
            ))
            .await
            .unwrap();
        assert!(location(&invalid).starts_with("/auth/register?error="));

        let rejected = app
            .oneshot(form_post(
                "/auth/register",
                "email=a%40b.co&username=al&password=pw",
            ))
            .await
            .unwrap();
        assert_eq!(
            location(&rejected),
            "/auth/register?error=Email%20already%20registered"
        );
        assert_eq!(api.requests().len(), 1);
    }
}
