//! HTTP API surface.
//!
//! Routes are split by concern (sessions, accounts, videos) into routers
//! with their own state, merged flat so the whole API mounts under one
//! prefix.

pub mod accounts;
pub mod error;
pub mod sessions;
pub mod videos;

use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::tasks::TaskQueue;

pub use error::ApiError;
pub use videos::CatalogCache;

/// Assemble the API router.
#[allow(clippy::too_many_arguments)]
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    secret: Arc<Vec<u8>>,
    tasks: TaskQueue,
    secure_cookies: bool,
    media_root: Arc<PathBuf>,
    public_origin: Arc<String>,
) -> Router {
    let sessions = sessions::router(sessions::SessionsState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    });

    let accounts = accounts::router(accounts::AccountsState {
        db: db.clone(),
        secret,
        tasks,
    });

    let videos = videos::router(videos::VideosState {
        db,
        jwt,
        media_root,
        cache: CatalogCache::new(),
        public_origin,
    });

    sessions.merge(accounts).merge(videos)
}
