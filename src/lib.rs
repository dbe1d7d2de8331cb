pub mod account_token;
pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod email;
pub mod jwt;
pub mod password;
pub mod tasks;

use api::create_api_router;
use axum::Router;
use db::Database;
use email::Mailer;
use jwt::JwtConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tasks::TaskQueue;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens; also keys activation/reset tokens
    pub jwt_secret: Vec<u8>,
    /// Directory holding video renditions and thumbnails
    pub media_root: PathBuf,
    /// Public origin of this API, used to build absolute media URLs
    pub public_origin: String,
    /// Frontend origin, used to build emailed activation/reset links
    pub frontend_origin: String,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Outbound email transport
    pub mailer: Arc<dyn Mailer>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));
    let secret = Arc::new(config.jwt_secret.clone());

    let tasks = TaskQueue::spawn(config.mailer.clone(), config.frontend_origin.clone());

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        secret,
        tasks,
        config.secure_cookies,
        Arc::new(config.media_root.clone()),
        Arc::new(config.public_origin.clone()),
    );

    Router::new().nest("/api", api_router)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    init_cleanup(&config.db).await;

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    (handle, local_addr)
}
