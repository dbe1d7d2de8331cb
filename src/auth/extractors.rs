//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};

use super::cookie::{ACCESS_COOKIE_NAME, bearer_token, get_cookie};
use super::errors::{AuthErrorKind, AuthRejection};
use super::state::HasAuthBackend;
use crate::db::User;
use crate::jwt::{AccessClaims, subject_id};

/// The resolved caller: access token claims plus the identity record they
/// point at.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: AccessClaims,
    pub user: User,
}

/// Core resolution logic behind the [`Auth`] extractor.
///
/// The Authorization header takes strict precedence over the cookie: when a
/// header is present the cookie is never consulted, even if the header does
/// not hold a usable bearer token. Clients that send both have opted into
/// header-based auth.
async fn resolve_request<S>(parts: &Parts, state: &S) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    let candidate = if parts.headers.contains_key(header::AUTHORIZATION) {
        bearer_token(&parts.headers).ok_or(AuthErrorKind::NotAuthenticated)?
    } else {
        get_cookie(&parts.headers, ACCESS_COOKIE_NAME).ok_or(AuthErrorKind::NotAuthenticated)?
    };

    let claims = state
        .jwt()
        .validate_access_token(candidate)
        .map_err(|e| {
            tracing::debug!("Access token rejected: {}", e);
            AuthErrorKind::InvalidToken
        })?;

    let user_id = subject_id(&claims.sub).map_err(|_| AuthErrorKind::InvalidToken)?;

    let user = state
        .db()
        .users()
        .get_by_id(user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up user: {}", e);
            AuthErrorKind::DatabaseError
        })?
        .ok_or(AuthErrorKind::UserNotFound)?;

    if !user.is_active {
        return Err(AuthErrorKind::UserNotFound);
    }

    Ok(AuthenticatedUser { claims, user })
}

/// Extractor for endpoints that require authentication.
/// Rejects with a JSON 401 when the caller cannot be resolved.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve_request(parts, state)
            .await
            .map(Auth)
            .map_err(AuthRejection::from)
    }
}
