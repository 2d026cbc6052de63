use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Inventory API client configuration.
///
/// The API base URL is a constructor parameter; everything else has a default.
///
/// ```rust,ignore
/// use cellar_client::ClientConfig;
///
/// let config = ClientConfig::new("http://localhost:8000".parse()?)
///     .with_timeout(std::time::Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) api_url: Url,
    pub(crate) timeout: Duration,
    pub(crate) credential_ttl: Duration,
}

impl ClientConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Stored credentials are valid for one hour.
    pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(3600);

    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            timeout: Self::DEFAULT_TIMEOUT,
            credential_ttl: Self::DEFAULT_CREDENTIAL_TTL,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `CELLAR_API_URL`: base URL of the inventory API
    ///
    /// # Optional env vars
    /// - `CELLAR_API_TIMEOUT_SECS`: per-request timeout (default 10)
    /// - `CELLAR_CREDENTIAL_TTL_SECS`: lifetime of stored credentials (default 3600)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL is missing or invalid, or a
    /// duration is not a positive integer.
    pub fn from_env() -> Result<Self, Error> {
        let api_url: Url = std::env::var("CELLAR_API_URL")
            .map_err(|_| Error::Config("CELLAR_API_URL is required".into()))?
            .parse()
            .map_err(|e| Error::Config(format!("CELLAR_API_URL: {e}")))?;

        let mut config = Self::new(api_url);
        if let Some(timeout) = env_secs("CELLAR_API_TIMEOUT_SECS")? {
            config = config.with_timeout(timeout);
        }
        if let Some(ttl) = env_secs("CELLAR_CREDENTIAL_TTL_SECS")? {
            config = config.with_credential_ttl(ttl);
        }
        Ok(config)
    }

    /// Upper bound on every upstream request. Expiry surfaces as
    /// [`Error::Transport`].
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Lifetime of the stored credentials (local hint and cookie max-age).
    #[must_use]
    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl = ttl;
        self
    }

    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn credential_ttl(&self) -> Duration {
        self.credential_ttl
    }
}

fn env_secs(name: &str) -> Result<Option<Duration>, Error> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(Error::Config(format!(
            "{name} must be a positive number of seconds, got '{raw}'"
        ))),
    }
}
