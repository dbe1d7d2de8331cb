#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use videoflix::email::{EmailError, Mailer};
use videoflix::{
    ServerConfig, create_app,
    db::Database,
    jwt::JwtConfig,
    password::hash_password,
};

pub const TEST_JWT_SECRET: &[u8] = b"test-jwt-secret-at-least-32-bytes!!";

/// Mailer that records messages instead of sending them.
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// Poll until at least `n` messages have been recorded. The task worker
    /// runs on the same runtime, so this resolves within a few polls.
    pub async fn wait_for(&self, n: usize) -> Vec<SentMail> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= n {
                return sent;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("Timed out waiting for {} emails", n);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub struct TestContext {
    pub app: axum::Router,
    pub db: Database,
    pub jwt: JwtConfig,
    pub mailer: Arc<RecordingMailer>,
    /// Keeps the media directory alive for the test's duration.
    pub media_dir: tempfile::TempDir,
}

/// Create a test app backed by an in-memory database and a temp media root.
pub async fn create_test_app() -> TestContext {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mailer = RecordingMailer::new();
    let media_dir = tempfile::tempdir().expect("Failed to create media dir");

    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_JWT_SECRET.to_vec(),
        media_root: media_dir.path().to_path_buf(),
        public_origin: "http://localhost:8000".to_string(),
        frontend_origin: "http://localhost:5500".to_string(),
        secure_cookies: false,
        mailer: mailer.clone(),
    };

    TestContext {
        app: create_app(&config),
        db,
        jwt: JwtConfig::new(TEST_JWT_SECRET),
        mailer,
        media_dir,
    }
}

/// Insert an active user directly and return their id.
pub async fn register_active_user(db: &Database, email: &str, password: &str) -> i64 {
    let hash = hash_password(password).expect("Failed to hash password");
    let id = db.users().create(email, &hash, 1_700_000_000).await.unwrap();
    assert!(db.users().activate(id).await.unwrap());
    id
}

/// Issue a token pair for a user the way login does, including the
/// outstanding-token record for the refresh token.
pub async fn issue_session(
    db: &Database,
    jwt: &JwtConfig,
    user_id: i64,
    email: &str,
) -> (String, String) {
    let (access, refresh) = jwt.issue_pair(user_id, email).unwrap();
    db.tokens()
        .record_outstanding(
            &refresh.jti,
            &refresh.token,
            user_id,
            refresh.issued_at,
            refresh.expires_at,
        )
        .await
        .unwrap();
    (access.token, refresh.token)
}

pub fn auth_cookies(access_token: &str, refresh_token: &str) -> String {
    format!(
        "access_token={}; refresh_token={}",
        access_token, refresh_token
    )
}

pub fn access_cookie_only(access_token: &str) -> String {
    format!("access_token={}", access_token)
}

pub fn refresh_cookie_only(refresh_token: &str) -> String {
    format!("refresh_token={}", refresh_token)
}

/// Extract Set-Cookie headers from response.
pub fn extract_set_cookies(response: &axum::http::Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Pull a cookie's value out of Set-Cookie headers.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies.iter().find_map(|c| {
        let rest = c.strip_prefix(&prefix)?;
        let value = rest.split(';').next()?.to_string();
        if value.is_empty() { None } else { Some(value) }
    })
}

/// Check if cookies contain a token being cleared (Max-Age=0).
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=", cookie_name)) && c.contains("Max-Age=0"))
}

/// Read the response body as JSON.
pub async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// POST a JSON payload.
pub fn post_json(uri: &str, payload: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

/// POST a JSON payload with a Cookie header.
pub fn post_json_with_cookies(
    uri: &str,
    payload: &serde_json::Value,
    cookies: &str,
) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("cookie", cookies)
        .body(Body::from(payload.to_string()))
        .unwrap()
}

/// POST with a Cookie header and empty body.
pub fn post_with_cookies(uri: &str, cookies: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("cookie", cookies)
        .body(Body::empty())
        .unwrap()
}

/// GET with a Cookie header.
pub fn get_with_cookies(uri: &str, cookies: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("cookie", cookies)
        .body(Body::empty())
        .unwrap()
}

/// GET with a bearer Authorization header.
pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// GET with no credentials.
pub fn get_plain(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Log in through the API and return (access, refresh) cookie values.
pub async fn login(ctx: &TestContext, email: &str, password: &str) -> (String, String) {
    let response = ctx
        .app
        .clone()
        .oneshot(post_json(
            "/api/login",
            &serde_json::json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = extract_set_cookies(&response);
    let access = cookie_value(&cookies, "access_token").expect("No access token cookie");
    let refresh = cookie_value(&cookies, "refresh_token").expect("No refresh token cookie");
    (access, refresh)
}

/// Create the HLS file layout for one rendition of a video under the media
/// root and return the playlist contents.
pub fn write_hls_rendition(media_root: &std::path::Path, movie_id: i64, resolution: &str) -> String {
    let dir: PathBuf = media_root
        .join("videos")
        .join(movie_id.to_string())
        .join(resolution);
    std::fs::create_dir_all(&dir).unwrap();

    let playlist = "#EXTM3U\n#EXT-X-VERSION:3\n#EXTINF:4.0,\n000.ts\n#EXT-X-ENDLIST\n";
    std::fs::write(dir.join("index.m3u8"), playlist).unwrap();
    std::fs::write(dir.join("000.ts"), b"fake-mpegts-payload").unwrap();
    playlist.to_string()
}
