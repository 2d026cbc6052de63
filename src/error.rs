use crate::api_error::ErrorDetail;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No session (or an empty access token) was available for the call.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The API could not be reached; no response was received.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The access token was rejected and could not be refreshed.
    /// The session has been cleared.
    #[error("Session expired")]
    SessionExpired,

    /// The API answered with a non-success status (or without its success marker).
    #[error("API error ({status}): {detail}")]
    Upstream { status: u16, detail: ErrorDetail },

    /// A success response whose body could not be decoded.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// The request body could not be serialized.
    #[error("Request encoding error: {0}")]
    Encode(String),

    /// Local form validation failed before anything was sent.
    #[error("Validation failed: {0}")]
    Validation(ErrorDetail),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the host should discard local credentials and route to login.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::SessionExpired)
    }

    /// Field-level messages carried by the error, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            Self::Upstream { detail, .. } | Self::Validation(detail) => Some(detail),
            _ => None,
        }
    }
}
