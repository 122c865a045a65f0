//! Content-addressable blob storage.
//!
//! Bodies are keyed by the SHA-256 of their raw bytes, so byte-identical
//! documents anywhere in any collection share one row. Rows are immutable:
//! writes are insert-if-absent and there is no update path.

use sha2::{Digest, Sha256};
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::now_iso;
use crate::error::{Error, Result};

/// Hex-encoded SHA-256 digest of `bytes`.
pub fn hash_content(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Store `body` and return its digest. A second put of the same bytes is a no-op.
pub async fn put(pool: &SqlitePool, body: &str) -> Result<String> {
    let hash = hash_content(body.as_bytes());
    let mut conn = pool.acquire().await?;
    insert_if_absent(&mut *conn, &hash, body).await?;
    Ok(hash)
}

/// Insert-if-absent on an existing connection, so callers can group it with
/// the catalog write in one transaction.
pub(crate) async fn insert_if_absent(
    conn: &mut SqliteConnection,
    hash: &str,
    body: &str,
) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO content (hash, doc, created_at) VALUES (?, ?, ?)")
        .bind(hash)
        .bind(body)
        .bind(now_iso())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, hash: &str) -> Result<String> {
    let body: Option<String> = sqlx::query_scalar("SELECT doc FROM content WHERE hash = ?")
        .bind(hash)
        .fetch_optional(pool)
        .await?;
    body.ok_or_else(|| Error::not_found("content", hash))
}

/// Number of catalog entries, active or not, that point at `hash`.
///
/// Entries refer to blobs by digest only, so this join is the one way to
/// find out whether a blob is still in use.
pub async fn reference_count(pool: &SqlitePool, hash: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE hash = ?")
        .bind(hash)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
