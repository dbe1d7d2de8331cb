//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Internal reason an authentication attempt resolved to anonymous.
#[derive(Debug)]
pub(super) enum AuthErrorKind {
    NotAuthenticated,
    InvalidToken,
    UserNotFound,
    DatabaseError,
}

/// Rejection returned by the [`super::Auth`] extractor.
#[derive(Debug)]
pub struct AuthRejection {
    pub(super) kind: AuthErrorKind,
}

impl AuthRejection {
    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated
            | AuthErrorKind::InvalidToken
            | AuthErrorKind::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthErrorKind::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::InvalidToken => "Invalid or expired token",
            AuthErrorKind::UserNotFound => "User not found",
            AuthErrorKind::DatabaseError => "Database error",
        }
    }
}

impl From<AuthErrorKind> for AuthRejection {
    fn from(kind: AuthErrorKind) -> Self {
        Self { kind }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            detail: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                detail: self.message(),
            }),
        )
            .into_response()
    }
}
