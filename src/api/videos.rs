//! Video catalog and HLS streaming endpoints.
//!
//! - GET `/video/` - cached catalog listing
//! - GET `/video/{movie_id}/{resolution}/index.m3u8` - HLS playlist
//! - GET `/video/{movie_id}/{resolution}/{segment}/` - HLS media segment
//! - GET `/media/{*path}` - thumbnails and other static media
//!
//! Streaming endpoints require authentication and never reveal whether a
//! miss was a bad id, a missing rendition, or a missing file: everything is
//! the same 404. The media route is public so thumbnails load in plain
//! `<img>` tags.

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use moka::future::Cache;
use serde::Serialize;
use std::path::{Component, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::io::ReaderStream;

use super::error::{ApiError, ResultExt};
use crate::auth::Auth;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// How long a catalog listing stays cached.
const CATALOG_CACHE_TTL: Duration = Duration::from_secs(300);

const HLS_PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const HLS_SEGMENT_CONTENT_TYPE: &str = "video/MP2T";

#[derive(Clone)]
pub struct VideosState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub media_root: Arc<PathBuf>,
    pub cache: CatalogCache,
    /// Origin prefixed onto relative thumbnail paths.
    pub public_origin: Arc<String>,
}

impl_has_auth_backend!(VideosState);

pub fn router(state: VideosState) -> Router {
    Router::new()
        .route("/video/", get(list_videos))
        .route("/video/{movie_id}/{resolution}/index.m3u8", get(hls_playlist))
        .route("/video/{movie_id}/{resolution}/{segment}/", get(hls_segment))
        .route("/media/{*path}", get(media))
        .with_state(state)
}

/// Catalog entry as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    pub id: i64,
    pub created_at: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub category: String,
}

/// TTL cache over the full catalog listing. A single key is enough since the
/// listing is not parameterized; entries expire after [`CATALOG_CACHE_TTL`].
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<&'static str, Arc<Vec<VideoSummary>>>,
    loads: Arc<AtomicU64>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(CATALOG_CACHE_TTL)
                .build(),
            loads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fetch the cached listing, loading from the database on a miss.
    /// Concurrent misses coalesce into a single load.
    pub async fn get_or_load(
        &self,
        db: &Database,
        public_origin: &str,
    ) -> Result<Arc<Vec<VideoSummary>>, Arc<sqlx::Error>> {
        self.cache
            .try_get_with("video_list", async {
                self.loads.fetch_add(1, Ordering::Relaxed);
                let videos = db.videos().list_all().await?;
                let summaries = videos
                    .into_iter()
                    .map(|v| VideoSummary {
                        id: v.id,
                        created_at: v.created_at,
                        title: v.title,
                        description: v.description,
                        thumbnail_url: v
                            .thumbnail
                            .map(|t| thumbnail_url(public_origin, &t)),
                        category: v.category,
                    })
                    .collect::<Vec<_>>();
                Ok(Arc::new(summaries))
            })
            .await
    }

    /// Number of database loads performed so far.
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute URL for a stored thumbnail path.
fn thumbnail_url(public_origin: &str, stored: &str) -> String {
    format!(
        "{}/api/media/{}",
        public_origin.trim_end_matches('/'),
        stored.trim_start_matches('/')
    )
}

/// List the video catalog. Served from cache for up to five minutes, so
/// writes to the catalog may take that long to become visible here.
async fn list_videos(
    Auth(_user): Auth,
    State(state): State<VideosState>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state
        .cache
        .get_or_load(&state.db, &state.public_origin)
        .await
        .db_err("Failed to load video catalog")?;

    Ok(Json(listing.as_ref().clone()))
}

/// Serve the HLS playlist for one rendition of a video.
async fn hls_playlist(
    Auth(_user): Auth,
    State(state): State<VideosState>,
    Path((movie_id, resolution)): Path<(i64, String)>,
) -> Result<Response, ApiError> {
    require_video(&state.db, movie_id).await?;
    if !is_safe_component(&resolution) {
        return Err(not_found());
    }

    let path = state
        .media_root
        .join("videos")
        .join(movie_id.to_string())
        .join(&resolution)
        .join("index.m3u8");

    stream_file(path, HLS_PLAYLIST_CONTENT_TYPE).await
}

/// Serve one HLS media segment.
async fn hls_segment(
    Auth(_user): Auth,
    State(state): State<VideosState>,
    Path((movie_id, resolution, segment)): Path<(i64, String, String)>,
) -> Result<Response, ApiError> {
    require_video(&state.db, movie_id).await?;
    if !is_safe_component(&resolution) || !is_safe_component(&segment) {
        return Err(not_found());
    }

    let path = state
        .media_root
        .join("videos")
        .join(movie_id.to_string())
        .join(&resolution)
        .join(&segment);

    stream_file(path, HLS_SEGMENT_CONTENT_TYPE).await
}

/// Serve a file from the media root, e.g. a thumbnail. The wildcard path is
/// rejected unless every component is a plain name, which keeps lookups
/// inside the media root.
async fn media(
    State(state): State<VideosState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let relative = PathBuf::from(&path);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(not_found());
    }

    let mime = mime_guess::from_path(&relative).first_or_octet_stream();
    stream_file(state.media_root.join(relative), mime.as_ref()).await
}

fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

async fn require_video(db: &Database, movie_id: i64) -> Result<(), ApiError> {
    db.videos()
        .get_by_id(movie_id)
        .await
        .db_err("Failed to look up video")?
        .map(|_| ())
        .ok_or_else(not_found)
}

/// A path segment is safe when it cannot change directories.
fn is_safe_component(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\'])
}

/// Stream a file from disk. Any open failure is reported as 404, so callers
/// cannot distinguish missing files from permission problems.
async fn stream_file(path: PathBuf, content_type: &str) -> Result<Response, ApiError> {
    let file = tokio::fs::File::open(&path).await.map_err(|_| not_found())?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [(header::CONTENT_TYPE, content_type.to_string())],
        body,
    )
        .into_response())
}
