//! Outstanding and blacklisted refresh token storage.
//!
//! Only refresh tokens are persisted. Access tokens are stateless and
//! short-lived, so they cannot be individually revoked before expiry.

use sqlx::sqlite::SqlitePool;

/// An outstanding refresh token record.
#[derive(Debug, Clone)]
pub struct OutstandingToken {
    pub id: i64,
    pub jti: String,
    pub user_id: i64,
    pub token: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    jti: String,
    user_id: i64,
    token: String,
    issued_at: i64,
    expires_at: i64,
}

impl From<TokenRow> for OutstandingToken {
    fn from(row: TokenRow) -> Self {
        Self {
            id: row.id,
            jti: row.jti,
            user_id: row.user_id,
            token: row.token,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
        }
    }
}

const TOKEN_COLUMNS: &str = "id, jti, user_id, token, issued_at, expires_at";

/// Store for outstanding refresh tokens and their blacklist.
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a freshly issued refresh token as outstanding.
    pub async fn record_outstanding(
        &self,
        jti: &str,
        token: &str,
        user_id: i64,
        issued_at: u64,
        expires_at: u64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO outstanding_tokens (jti, user_id, token, issued_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(jti)
        .bind(user_id)
        .bind(token)
        .bind(issued_at as i64)
        .bind(expires_at as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get an outstanding token by its JWT ID.
    pub async fn get_by_jti(&self, jti: &str) -> Result<Option<OutstandingToken>, sqlx::Error> {
        let row: Option<TokenRow> = sqlx::query_as(&format!(
            "SELECT {TOKEN_COLUMNS} FROM outstanding_tokens WHERE jti = ?"
        ))
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(OutstandingToken::from))
    }

    /// Get the outstanding record matching a (subject, token) pair.
    pub async fn get_outstanding(
        &self,
        user_id: i64,
        token: &str,
    ) -> Result<Option<OutstandingToken>, sqlx::Error> {
        let row: Option<TokenRow> = sqlx::query_as(&format!(
            "SELECT {TOKEN_COLUMNS} FROM outstanding_tokens WHERE user_id = ? AND token = ?"
        ))
        .bind(user_id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(OutstandingToken::from))
    }

    /// Blacklist an outstanding token. Idempotent: repeated calls for the
    /// same token are no-ops, including under concurrent logouts.
    pub async fn blacklist(&self, token_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO blacklisted_tokens (token_id) VALUES (?)")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Check whether the refresh token with this JWT ID has been blacklisted.
    pub async fn is_blacklisted(&self, jti: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as(
            "SELECT COUNT(*) FROM blacklisted_tokens b
             JOIN outstanding_tokens o ON o.id = b.token_id
             WHERE o.jti = ?",
        )
        .bind(jti)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0 > 0)
    }

    /// Delete all naturally expired outstanding tokens.
    /// Blacklist rows cascade with their outstanding record.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM outstanding_tokens WHERE expires_at < CAST(strftime('%s','now') AS INTEGER)",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
