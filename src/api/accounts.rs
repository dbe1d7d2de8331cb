//! Account lifecycle endpoints.
//!
//! - POST `/register` - create an inactive account, queue the activation mail
//! - GET `/activate/{uid}/{token}` - flip the account active
//! - POST `/password_reset` - queue a reset mail without leaking existence
//! - POST `/password_confirm/{uid}/{token}` - set the new password
//!
//! Activation and reset tokens are stateless HMACs over the account state
//! (see [`crate::account_token`]), so using one mutates the state it was
//! derived from and retires it.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use validator::ValidateEmail;

use super::error::{ApiError, ResultExt};
use crate::account_token::{TokenPurpose, check_token, decode_uid, encode_uid, make_token};
use crate::db::{Database, User};
use crate::password::hash_password;
use crate::tasks::{Job, TaskQueue};

#[derive(Clone)]
pub struct AccountsState {
    pub db: Database,
    /// Signing key for activation and reset tokens.
    pub secret: Arc<Vec<u8>>,
    pub tasks: TaskQueue,
}

pub fn router(state: AccountsState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/activate/{uid}/{token}", get(activate))
        .route("/password_reset", post(password_reset))
        .route("/password_confirm/{uid}/{token}", post(password_confirm))
        .with_state(state)
}

fn unix_now() -> Result<u64, ApiError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| ApiError::internal("System time error"))
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    confirmed_password: String,
}

/// Register a new account. The account starts inactive and only becomes
/// usable through the emailed activation link.
async fn register(
    State(state): State<AccountsState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !payload.email.validate_email() {
        return Err(ApiError::bad_request("Enter a valid email address."));
    }
    if payload.password.is_empty() || payload.password != payload.confirmed_password {
        return Err(ApiError::bad_request("Passwords do not match"));
    }
    if state
        .db
        .users()
        .email_exists(&payload.email)
        .await
        .db_err("Failed to check email")?
    {
        return Err(ApiError::bad_request("Email already exists"));
    }

    let now = unix_now()?;
    let hash = hash_password(&payload.password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ApiError::internal("Failed to process password")
    })?;

    let user_id = state
        .db
        .users()
        .create(&payload.email, &hash, now as i64)
        .await
        .db_err("Failed to create user")?;

    // Token derivation needs the stored row, not the request payload.
    let user = state
        .db
        .users()
        .get_by_id(user_id)
        .await
        .db_err("Failed to load new user")?
        .ok_or_else(|| ApiError::internal("User vanished after insert"))?;

    state.tasks.submit(Job::ActivationEmail {
        email: user.email.clone(),
        uid: encode_uid(user.id),
        token: make_token(&user, TokenPurpose::Activation, &state.secret, now),
    });

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "user": { "id": user.id, "email": user.email },
        })),
    ))
}

/// Activate an account from the emailed link. Single-use: activation
/// changes the state the token was derived from. This endpoint keys its
/// bodies on "message" rather than "detail"; frontends render it directly.
async fn activate(
    State(state): State<AccountsState>,
    Path((uid, token)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    fn failed() -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "message": "Activation failed" })),
        )
            .into_response()
    }

    let user = resolve_link_user(&state.db, &uid).await?;
    let now = unix_now()?;

    let valid = match &user {
        Some(user) => check_token(user, TokenPurpose::Activation, &state.secret, &token, now),
        None => false,
    };
    let user = match user {
        Some(user) if valid => user,
        _ => return Ok(failed()),
    };

    if !state
        .db
        .users()
        .activate(user.id)
        .await
        .db_err("Failed to activate user")?
    {
        // Already active: the token no longer matches current state anyway,
        // but guard against races between two identical requests.
        return Ok(failed());
    }

    Ok(Json(serde_json::json!({
        "message": "Account successfully activated."
    }))
    .into_response())
}

#[derive(Deserialize)]
struct PasswordResetRequest {
    email: String,
}

/// Request a password reset. The response is identical whether or not the
/// address has an account, and an email goes out either way.
async fn password_reset(
    State(state): State<AccountsState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !payload.email.validate_email() {
        return Err(ApiError::bad_request("Enter a valid email address."));
    }

    let user = state
        .db
        .users()
        .get_by_email(&payload.email)
        .await
        .db_err("Failed to look up user")?;

    match user {
        Some(user) => {
            let now = unix_now()?;
            state.tasks.submit(Job::PasswordResetEmail {
                email: user.email.clone(),
                uid: encode_uid(user.id),
                token: make_token(&user, TokenPurpose::PasswordReset, &state.secret, now),
            });
        }
        None => {
            state.tasks.submit(Job::GenericResetNotice {
                email: payload.email,
            });
        }
    }

    Ok(Json(serde_json::json!({
        "detail": "An email has been sent to reset your password."
    })))
}

#[derive(Deserialize)]
struct PasswordConfirmRequest {
    new_password: String,
    confirm_password: String,
}

/// Set a new password via the emailed reset link.
async fn password_confirm(
    State(state): State<AccountsState>,
    Path((uid, token)): Path<(String, String)>,
    Json(payload): Json<PasswordConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    const INVALID: &str = "Invalid reset link";

    if payload.new_password.is_empty() || payload.new_password != payload.confirm_password {
        return Err(ApiError::bad_request("Passwords do not match"));
    }

    let user = resolve_link_user(&state.db, &uid).await?;
    let now = unix_now()?;

    let valid = match &user {
        Some(user) => check_token(
            user,
            TokenPurpose::PasswordReset,
            &state.secret,
            &token,
            now,
        ),
        None => false,
    };
    if !valid {
        return Err(ApiError::bad_request(INVALID));
    }
    let user = user.ok_or_else(|| ApiError::bad_request(INVALID))?;

    let hash = hash_password(&payload.new_password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ApiError::internal("Failed to process password")
    })?;

    state
        .db
        .users()
        .set_password(user.id, &hash, now as i64)
        .await
        .db_err("Failed to update password")?;

    Ok(Json(serde_json::json!({
        "detail": "Your Password has been successfully reset."
    })))
}

/// Resolve the uid path segment of an emailed link to a user, treating a
/// malformed uid the same as an unknown one.
async fn resolve_link_user(db: &Database, uid: &str) -> Result<Option<User>, ApiError> {
    let Some(user_id) = decode_uid(uid) else {
        return Ok(None);
    };
    db.users()
        .get_by_id(user_id)
        .await
        .db_err("Failed to look up user")
}
