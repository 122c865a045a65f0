//! Document catalog: one record per (collection, relative path).
//!
//! [`upsert`] is the only write path for document content. It inserts the
//! body into the content store, writes the catalog row, and resyncs the
//! full-text row in a single transaction, so readers see either the old
//! title/body/index triple or the new one.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::content;
use crate::db::now_iso;
use crate::error::{Error, Result};
use crate::fts;
use crate::models::{display_path, DocumentEntry};

/// How an [`upsert`] changed the catalog, judged against the row as it was
/// before the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// No row for this path, or the row was inactive.
    Added,
    /// An active row existed with a different content hash.
    Updated,
    /// An active row existed with the same hash; nothing was written.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: i64,
    pub content_hash: String,
    pub change: Change,
}

/// Bind `(collection, path)` to `body`, forcing the entry active.
pub async fn upsert(
    pool: &SqlitePool,
    collection: &str,
    path: &str,
    title: &str,
    body: &str,
) -> Result<UpsertOutcome> {
    let hash = content::hash_content(body.as_bytes());
    let mut tx = pool.begin().await?;

    let prior: Option<(i64, String, i64)> = sqlx::query_as(
        "SELECT id, hash, active FROM documents WHERE collection = ? AND path = ?",
    )
    .bind(collection)
    .bind(path)
    .fetch_optional(&mut *tx)
    .await?;

    let change = match &prior {
        None => Change::Added,
        Some((_, _, 0)) => Change::Added,
        Some((_, old_hash, _)) if *old_hash == hash => Change::Unchanged,
        Some(_) => Change::Updated,
    };

    if let (Change::Unchanged, Some((id, _, _))) = (change, &prior) {
        tx.rollback().await?;
        return Ok(UpsertOutcome {
            id: *id,
            content_hash: hash,
            change,
        });
    }

    content::insert_if_absent(&mut *tx, &hash, body).await?;

    let now = now_iso();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO documents (collection, path, title, hash, created_at, modified_at, active)
        VALUES (?, ?, ?, ?, ?, ?, 1)
        ON CONFLICT(collection, path) DO UPDATE SET
            title = excluded.title,
            hash = excluded.hash,
            modified_at = excluded.modified_at,
            active = 1
        RETURNING id
        "#,
    )
    .bind(collection)
    .bind(path)
    .bind(title)
    .bind(&hash)
    .bind(&now)
    .bind(&now)
    .fetch_one(&mut *tx)
    .await?;

    fts::resync(&mut *tx, id, &display_path(collection, path), title, body).await?;

    tx.commit().await?;
    debug!("{:?} {}/{} (id {})", change, collection, path, id);

    Ok(UpsertOutcome {
        id,
        content_hash: hash,
        change,
    })
}

/// Paths of every active entry in `collection`.
pub async fn active_paths(pool: &SqlitePool, collection: &str) -> Result<Vec<String>> {
    let paths = sqlx::query_scalar(
        "SELECT path FROM documents WHERE collection = ? AND active = 1 ORDER BY path",
    )
    .bind(collection)
    .fetch_all(pool)
    .await?;
    Ok(paths)
}

/// Soft-delete the given paths. Returns how many active entries flipped.
pub async fn mark_inactive(pool: &SqlitePool, collection: &str, paths: &[String]) -> Result<u64> {
    if paths.is_empty() {
        return Ok(0);
    }

    let now = now_iso();
    let mut tx = pool.begin().await?;
    let mut flipped = 0u64;

    for path in paths {
        flipped += sqlx::query(
            "UPDATE documents SET active = 0, modified_at = ? WHERE collection = ? AND path = ? AND active = 1",
        )
        .bind(&now)
        .bind(collection)
        .bind(path)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    tx.commit().await?;
    Ok(flipped)
}

/// Fetch an active entry.
pub async fn get(pool: &SqlitePool, collection: &str, path: &str) -> Result<DocumentEntry> {
    let row = sqlx::query(
        r#"
        SELECT id, collection, path, title, hash, created_at, modified_at, active
        FROM documents
        WHERE collection = ? AND path = ? AND active = 1
        "#,
    )
    .bind(collection)
    .bind(path)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(entry_from_row(&row)),
        None => Err(Error::not_found("document", display_path(collection, path))),
    }
}

/// Every active entry in `collection`, ordered by path.
pub async fn list(pool: &SqlitePool, collection: &str) -> Result<Vec<DocumentEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, collection, path, title, hash, created_at, modified_at, active
        FROM documents
        WHERE collection = ? AND active = 1
        ORDER BY path
        "#,
    )
    .bind(collection)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(entry_from_row).collect())
}

/// Delete a collection, its catalog entries, and their full-text rows in one
/// transaction. Content blobs and embeddings are left in place.
pub async fn remove_collection(pool: &SqlitePool, name: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    fts::delete_collection(&mut *tx, name).await?;

    let docs = sqlx::query("DELETE FROM documents WHERE collection = ?")
        .bind(name)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let affected = sqlx::query("DELETE FROM collections WHERE name = ?")
        .bind(name)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if affected == 0 {
        tx.rollback().await?;
        return Err(Error::not_found("collection", name));
    }

    tx.commit().await?;
    debug!("removed collection {} ({} entries)", name, docs);
    Ok(())
}

pub(crate) fn entry_from_row(row: &SqliteRow) -> DocumentEntry {
    let active: i64 = row.get("active");
    DocumentEntry {
        id: row.get("id"),
        collection: row.get("collection"),
        path: row.get("path"),
        title: row.get("title"),
        content_hash: row.get("hash"),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
        active: active != 0,
    }
}
