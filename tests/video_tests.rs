//! Tests for the video catalog endpoint and its cache.

mod common;

use axum::http::StatusCode;
use common::*;
use tower::ServiceExt;

async fn seed_video(ctx: &common::TestContext, title: &str, thumbnail: Option<&str>) -> i64 {
    ctx.db
        .videos()
        .create(title, "A description", "Drama", thumbnail, None)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_catalog_requires_authentication() {
    let ctx = create_test_app().await;

    let response = ctx.app.clone().oneshot(get_plain("/api/video/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_catalog_with_cookie_auth() {
    let ctx = create_test_app().await;
    register_active_user(&ctx.db, "alice@example.com", "s3cret-pw").await;
    let (access, _) = login(&ctx, "alice@example.com", "s3cret-pw").await;
    seed_video(&ctx, "Breakout", None).await;

    let response = ctx
        .app
        .clone()
        .oneshot(get_with_cookies("/api/video/", &access_cookie_only(&access)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let list = body.as_array().expect("Catalog is not an array");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Breakout");
    assert_eq!(list[0]["category"], "Drama");
}

#[tokio::test]
async fn test_catalog_with_bearer_auth() {
    let ctx = create_test_app().await;
    let user_id = register_active_user(&ctx.db, "alice@example.com", "s3cret-pw").await;
    let (access, _) = issue_session(&ctx.db, &ctx.jwt, user_id, "alice@example.com").await;

    let response = ctx
        .app
        .clone()
        .oneshot(get_with_bearer("/api/video/", &access))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bad_bearer_does_not_fall_back_to_cookie() {
    let ctx = create_test_app().await;
    register_active_user(&ctx.db, "alice@example.com", "s3cret-pw").await;
    let (access, _) = login(&ctx, "alice@example.com", "s3cret-pw").await;

    // Valid cookie, but the Authorization header takes precedence and is bad
    let response = ctx
        .app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/api/video/")
                .header("cookie", access_cookie_only(&access))
                .header("authorization", "Bearer garbage")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_catalog_thumbnail_urls_are_absolute() {
    let ctx = create_test_app().await;
    register_active_user(&ctx.db, "alice@example.com", "s3cret-pw").await;
    let (access, _) = login(&ctx, "alice@example.com", "s3cret-pw").await;
    seed_video(&ctx, "Breakout", Some("thumbnails/breakout.jpg")).await;
    seed_video(&ctx, "No Art", None).await;

    let response = ctx
        .app
        .clone()
        .oneshot(get_with_cookies("/api/video/", &access_cookie_only(&access)))
        .await
        .unwrap();

    let body = body_json(response).await;
    let list = body.as_array().unwrap();
    assert_eq!(
        list[0]["thumbnail_url"],
        "http://localhost:8000/api/media/thumbnails/breakout.jpg"
    );
    assert!(list[1]["thumbnail_url"].is_null());
}

#[tokio::test]
async fn test_catalog_is_served_from_cache() {
    let ctx = create_test_app().await;
    register_active_user(&ctx.db, "alice@example.com", "s3cret-pw").await;
    let (access, _) = login(&ctx, "alice@example.com", "s3cret-pw").await;
    let video_id = seed_video(&ctx, "Breakout", None).await;

    let response = ctx
        .app
        .clone()
        .oneshot(get_with_cookies("/api/video/", &access_cookie_only(&access)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert_eq!(first.as_array().unwrap().len(), 1);

    // Remove the row behind the cache's back; the listing must not notice
    assert!(ctx.db.videos().delete(video_id).await.unwrap());

    let response = ctx
        .app
        .clone()
        .oneshot(get_with_cookies("/api/video/", &access_cookie_only(&access)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_catalog_orders_by_id() {
    let ctx = create_test_app().await;
    register_active_user(&ctx.db, "alice@example.com", "s3cret-pw").await;
    let (access, _) = login(&ctx, "alice@example.com", "s3cret-pw").await;

    let a = seed_video(&ctx, "First", None).await;
    let b = seed_video(&ctx, "Second", None).await;
    assert!(a < b);

    let response = ctx
        .app
        .clone()
        .oneshot(get_with_cookies("/api/video/", &access_cookie_only(&access)))
        .await
        .unwrap();

    let body = body_json(response).await;
    let list = body.as_array().unwrap();
    assert_eq!(list[0]["title"], "First");
    assert_eq!(list[1]["title"], "Second");
}
