use axum_extra::extract::cookie::Key;

use crate::config::ClientConfig;
use crate::error::Error;

/// Cookie and redirect settings shared by the routes and the extractor.
#[derive(Clone)]
pub(crate) struct WebSettings {
    pub(crate) cookie_key: Key,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) login_page: String,
    pub(crate) register_page: String,
    pub(crate) login_redirect: String,
    pub(crate) logout_redirect: String,
}

impl WebSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            secure_cookies: true,
            auth_path: "/auth".into(),
            login_page: super::error::LOGIN_PAGE.into(),
            register_page: "/auth/register".into(),
            login_redirect: "/cellars".into(),
            logout_redirect: super::error::LOGIN_PAGE.into(),
        }
    }
}

/// Web integration configuration.
///
/// Use [`from_env()`](WebConfig::from_env) for convention-based setup,
/// or [`new()`](WebConfig::new) with `with_*` methods for full control.
pub struct WebConfig {
    pub(super) client: ClientConfig,
    pub(super) settings: WebSettings,
}

impl WebConfig {
    #[must_use]
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            settings: WebSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// Reads everything [`ClientConfig::from_env`] reads, plus:
    /// - `COOKIE_KEY`: cookie encryption key bytes (at least 64); ephemeral if unset
    /// - `DEV_INSECURE_COOKIES`: `"1"` or `"true"` drops the `Secure` cookie flag
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the client config is invalid or `COOKIE_KEY`
    /// is set but too short.
    pub fn from_env() -> Result<Self, Error> {
        let client = ClientConfig::from_env()?;

        let insecure = matches!(
            std::env::var("DEV_INSECURE_COOKIES").as_deref(),
            Ok("1") | Ok("true"),
        );

        let cookie_key = match std::env::var("COOKIE_KEY") {
            Ok(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                Error::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            Err(_) => Key::generate(),
        };

        Ok(Self::new(client)
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!insecure))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Prefix of the login/logout/register routes (default `/auth`).
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    /// Page that failed logins and expired sessions redirect to.
    #[must_use]
    pub fn with_login_page(mut self, path: impl Into<String>) -> Self {
        self.settings.login_page = path.into();
        self
    }

    /// Page that failed registrations redirect back to (default `/auth/register`).
    #[must_use]
    pub fn with_register_page(mut self, path: impl Into<String>) -> Self {
        self.settings.register_page = path.into();
        self
    }

    /// Where a successful login lands (default `/cellars`).
    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }

    #[must_use]
    pub fn client_config(&self) -> &ClientConfig {
        &self.client
    }
}
