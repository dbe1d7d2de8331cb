use sqlx::sqlite::SqlitePool;

/// A catalog entry. Created on upload, never mutated afterwards; the HLS
/// renditions on disk are produced by an external transcoding pipeline.
#[derive(Debug, Clone)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Path of the thumbnail relative to the media root, if any.
    pub thumbnail: Option<String>,
    /// Path of the uploaded source file relative to the media root, if any.
    pub original_file: Option<String>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct VideoRow {
    id: i64,
    title: String,
    description: String,
    category: String,
    thumbnail: Option<String>,
    original_file: Option<String>,
    created_at: String,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            thumbnail: row.thumbnail,
            original_file: row.original_file,
            created_at: row.created_at,
        }
    }
}

const VIDEO_COLUMNS: &str = "id, title, description, category, thumbnail, original_file, created_at";

#[derive(Clone)]
pub struct VideoStore {
    pool: SqlitePool,
}

impl VideoStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new video record. Returns the video ID.
    pub async fn create(
        &self,
        title: &str,
        description: &str,
        category: &str,
        thumbnail: Option<&str>,
        original_file: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO videos (title, description, category, thumbnail, original_file) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(title)
        .bind(description)
        .bind(category)
        .bind(thumbnail)
        .bind(original_file)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a video by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Video>, sqlx::Error> {
        let row: Option<VideoRow> =
            sqlx::query_as(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Video::from))
    }

    /// List the whole catalog, oldest first.
    pub async fn list_all(&self) -> Result<Vec<Video>, sqlx::Error> {
        let rows: Vec<VideoRow> =
            sqlx::query_as(&format!("SELECT {VIDEO_COLUMNS} FROM videos ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Video::from).collect())
    }

    /// Delete a video record.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
