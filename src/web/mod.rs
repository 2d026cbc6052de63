//! Cookie-backed sessions for Axum front-ends of the inventory API.
//!
//! Credentials live in encrypted private cookies. The [`ApiSession`]
//! extractor turns them into a [`SessionClient`](crate::SessionClient) for
//! the request, and [`ApiSession::respond`] writes refreshed credentials back
//! and sends login errors to the configured login page.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cellar_client::web::{ApiSession, WebConfig, WebState, auth_routes};
//!
//! // 1. Configure from environment
//! let state = WebState::from_config(WebConfig::from_env()?)?;
//!
//! // 2. Mount login/logout/register
//! let app = axum::Router::new()
//!     .route("/cellars", get(cellars))
//!     .with_state(state.clone())
//!     .merge(auth_routes(state));
//!
//! // 3. Take `ApiSession` in protected handlers
//! async fn cellars(api: ApiSession) -> Response {
//!     let cellars = api.client().list_cellars().await.map(Json);
//!     api.respond(cellars).await
//! }
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;

pub use config::WebConfig;
pub use error::LoginRequired;
pub use extractor::ApiSession;
pub use routes::auth_routes;
pub use state::WebState;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
