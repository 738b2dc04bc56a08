//! Authentication extractors.
//!
//! Login happens outside the storefront API; it leaves a [`CurrentUser`] in
//! the session under [`session_keys::CURRENT_USER`]. Handlers that act on a
//! user's cart or orders take [`RequireAuth`].

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, session_keys};

/// Extractor that requires an authenticated user.
///
/// Rejects with `401` JSON when no user is in the session.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let user: CurrentUser = session
            .get(session_keys::CURRENT_USER)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to read session");
                AppError::Unauthorized("session unavailable".to_string())
            })?
            .ok_or_else(|| AppError::Unauthorized("login required".to_string()))?;

        tracing::Span::current().record("user_id", user.id.as_i64());
        set_sentry_user(&user.id, Some(&user.email));

        Ok(Self(user))
    }
}
