//! Session lifecycle endpoints.
//!
//! - POST `/login` - credential check, token pair issuance, cookie attachment
//! - POST `/logout` - refresh token blacklisting, cookie clearing
//! - POST `/token/refresh` - exchange refresh token for a new access token

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, session_cookie,
};
use crate::db::Database;
use crate::jwt::{JwtConfig, subject_id};
use crate::password::verify_password;

#[derive(Clone)]
pub struct SessionsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

pub fn router(state: SessionsState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/token/refresh", post(refresh))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct UserSummary {
    id: i64,
    username: String,
}

#[derive(Serialize)]
struct LoginResponse {
    detail: &'static str,
    user: UserSummary,
}

/// Log in with email and password.
///
/// Every failure (unknown email, wrong password, inactive account) collapses
/// into one undifferentiated 400 so the response does not reveal which check
/// failed. On success both tokens are attached as HttpOnly cookies and the
/// refresh token is recorded as outstanding; tokens never appear in the body.
async fn login(
    State(state): State<SessionsState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    const INVALID: &str = "Wrong email or password";

    let user = state
        .db
        .users()
        .get_by_email(&payload.email)
        .await
        .db_err("Failed to look up user")?;

    let user = match user {
        Some(user)
            if verify_password(&payload.password, &user.password_hash) && user.is_active =>
        {
            user
        }
        _ => return Err(ApiError::bad_request(INVALID)),
    };

    let (access, refresh) = state.jwt.issue_pair(user.id, &user.email).map_err(|e| {
        error!("Failed to issue token pair: {}", e);
        ApiError::internal("Failed to issue tokens")
    })?;

    state
        .db
        .tokens()
        .record_outstanding(
            &refresh.jti,
            &refresh.token,
            user.id,
            refresh.issued_at,
            refresh.expires_at,
        )
        .await
        .db_err("Failed to record refresh token")?;

    let cookies = AppendHeaders([
        (
            SET_COOKIE,
            session_cookie(
                ACCESS_COOKIE_NAME,
                &access.token,
                access.duration,
                state.secure_cookies,
            ),
        ),
        (
            SET_COOKIE,
            session_cookie(
                REFRESH_COOKIE_NAME,
                &refresh.token,
                refresh.duration,
                state.secure_cookies,
            ),
        ),
    ]);

    Ok((
        StatusCode::OK,
        cookies,
        Json(LoginResponse {
            detail: "Login successful",
            user: UserSummary {
                id: user.id,
                username: user.email,
            },
        }),
    ))
}

/// Log out by blacklisting the refresh token from the cookie.
///
/// Deliberately permissive: any well-formed refresh token yields 200 and
/// cleared cookies, even when it was already blacklisted or its outstanding
/// record is gone. Only a missing or malformed token is an error.
async fn logout(
    State(state): State<SessionsState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .ok_or_else(|| ApiError::bad_request("Refresh token missing."))?;

    let claims = state
        .jwt
        .validate_refresh_token(refresh_token)
        .map_err(|_| ApiError::bad_request("Invalid refresh token"))?;

    let user_id =
        subject_id(&claims.sub).map_err(|_| ApiError::bad_request("Invalid refresh token"))?;

    // Blacklist the matching outstanding record, if any. Idempotent.
    if let Some(outstanding) = state
        .db
        .tokens()
        .get_outstanding(user_id, refresh_token)
        .await
        .db_err("Failed to look up refresh token")?
    {
        state
            .db
            .tokens()
            .blacklist(outstanding.id)
            .await
            .db_err("Failed to blacklist refresh token")?;
    }

    let cookies = AppendHeaders([
        (
            SET_COOKIE,
            clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies),
        ),
        (
            SET_COOKIE,
            clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies),
        ),
    ]);

    Ok((
        StatusCode::OK,
        cookies,
        Json(serde_json::json!({
            "detail": "Log-Out successfully! All Tokens will be deleted. Refresh token is now invalid."
        })),
    ))
}

/// Exchange the refresh token cookie for a new access token.
///
/// Missing cookie is a 400; a malformed, expired, blacklisted, or
/// unresolvable token is a 401 (distinct from the missing-token case). The
/// refresh token itself is not rotated. The new access token is returned in
/// the body as well as the cookie for non-cookie clients.
async fn refresh(
    State(state): State<SessionsState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    const INVALID: &str = "Invalid refresh token.";

    let refresh_token = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .ok_or_else(|| ApiError::bad_request("Refresh token missing."))?;

    let claims = state
        .jwt
        .validate_refresh_token(refresh_token)
        .map_err(|_| ApiError::unauthorized(INVALID))?;

    if state
        .db
        .tokens()
        .is_blacklisted(&claims.jti)
        .await
        .db_err("Failed to check blacklist")?
    {
        return Err(ApiError::unauthorized(INVALID));
    }

    let user_id = subject_id(&claims.sub).map_err(|_| ApiError::unauthorized(INVALID))?;
    let user = state
        .db
        .users()
        .get_by_id(user_id)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::unauthorized(INVALID))?;

    if !user.is_active {
        return Err(ApiError::unauthorized(INVALID));
    }

    let access = state
        .jwt
        .generate_access_token(user.id, &user.email)
        .map_err(|e| {
            error!("Failed to generate access token: {}", e);
            ApiError::internal("Failed to generate token")
        })?;

    let cookie = session_cookie(
        ACCESS_COOKIE_NAME,
        &access.token,
        access.duration,
        state.secure_cookies,
    );

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(serde_json::json!({
            "detail": "Token refreshed",
            "access": access.token,
        })),
    ))
}
