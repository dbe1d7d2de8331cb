//! Tests for the token refresh endpoint.
//!
//! A missing refresh cookie is a 400; anything wrong with the token itself
//! (malformed, blacklisted, unknown user) is a 401. Success mints a new
//! access token without rotating the refresh token.

mod common;

use axum::http::StatusCode;
use common::*;
use tower::ServiceExt;

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let ctx = create_test_app().await;
    register_active_user(&ctx.db, "alice@example.com", "s3cret-pw").await;
    let (_, refresh) = login(&ctx, "alice@example.com", "s3cret-pw").await;

    let response = ctx
        .app
        .clone()
        .oneshot(post_with_cookies(
            "/api/token/refresh",
            &refresh_cookie_only(&refresh),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let cookies = extract_set_cookies(&response);
    let access = cookie_value(&cookies, "access_token").expect("No new access cookie");
    // No refresh rotation
    assert!(cookie_value(&cookies, "refresh_token").is_none());

    let claims = ctx.jwt.validate_access_token(&access).unwrap();
    assert_eq!(claims.email, "alice@example.com");

    let body = body_json(response).await;
    assert_eq!(body["detail"], "Token refreshed");
    assert_eq!(body["access"], access);
}

#[tokio::test]
async fn test_refresh_without_cookie() {
    let ctx = create_test_app().await;

    let response = ctx
        .app
        .clone()
        .oneshot(post_with_cookies("/api/token/refresh", "foo=bar"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "Refresh token missing.");
}

#[tokio::test]
async fn test_refresh_with_garbage_token() {
    let ctx = create_test_app().await;

    let response = ctx
        .app
        .clone()
        .oneshot(post_with_cookies(
            "/api/token/refresh",
            &refresh_cookie_only("garbage"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "Invalid refresh token.");
}

#[tokio::test]
async fn test_refresh_with_access_token_rejected() {
    let ctx = create_test_app().await;
    let user_id = register_active_user(&ctx.db, "alice@example.com", "s3cret-pw").await;
    let (access, _) = issue_session(&ctx.db, &ctx.jwt, user_id, "alice@example.com").await;

    // An access token in the refresh cookie slot must not refresh
    let response = ctx
        .app
        .clone()
        .oneshot(post_with_cookies(
            "/api/token/refresh",
            &refresh_cookie_only(&access),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_after_logout_rejected() {
    let ctx = create_test_app().await;
    register_active_user(&ctx.db, "alice@example.com", "s3cret-pw").await;
    let (_, refresh) = login(&ctx, "alice@example.com", "s3cret-pw").await;

    let response = ctx
        .app
        .clone()
        .oneshot(post_with_cookies(
            "/api/logout",
            &refresh_cookie_only(&refresh),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(post_with_cookies(
            "/api/token/refresh",
            &refresh_cookie_only(&refresh),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "Invalid refresh token.");
}

#[tokio::test]
async fn test_refreshed_access_token_authenticates() {
    let ctx = create_test_app().await;
    register_active_user(&ctx.db, "alice@example.com", "s3cret-pw").await;
    let (_, refresh) = login(&ctx, "alice@example.com", "s3cret-pw").await;

    let response = ctx
        .app
        .clone()
        .oneshot(post_with_cookies(
            "/api/token/refresh",
            &refresh_cookie_only(&refresh),
        ))
        .await
        .unwrap();
    let cookies = extract_set_cookies(&response);
    let access = cookie_value(&cookies, "access_token").unwrap();

    let response = ctx
        .app
        .clone()
        .oneshot(get_with_cookies("/api/video/", &access_cookie_only(&access)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
