//! Full-text index over `(filepath, title, body)`.
//!
//! One FTS5 row per catalog entry, sharing the entry's id as `rowid`. Writes
//! always delete-then-insert so the tokenization never goes stale. Queries
//! rank with `bm25()`: **lower scores are better**, and ties fall back to the
//! entry id so result order is total and deterministic.

use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::models::SearchResult;

/// Replace the index row for entry `id` with fresh values.
pub(crate) async fn resync(
    conn: &mut SqliteConnection,
    id: i64,
    display_path: &str,
    title: &str,
    body: &str,
) -> Result<()> {
    sqlx::query("DELETE FROM documents_fts WHERE rowid = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("INSERT INTO documents_fts (rowid, filepath, title, body) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(display_path)
        .bind(title)
        .bind(body)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Drop the index rows of every entry in `collection`. Must run before the
/// catalog rows themselves are deleted.
pub(crate) async fn delete_collection(conn: &mut SqliteConnection, collection: &str) -> Result<()> {
    sqlx::query("DELETE FROM documents_fts WHERE rowid IN (SELECT id FROM documents WHERE collection = ?)")
        .bind(collection)
        .execute(conn)
        .await?;
    Ok(())
}

/// Ranked full-text search over active entries.
///
/// `limit <= 0` uses `config.default_limit`. Snippets take up to
/// `config.snippet_tokens` tokens of the body around the best match, with
/// matches wrapped in the configured highlight markers.
pub async fn search(
    pool: &SqlitePool,
    query: &str,
    limit: i64,
    config: &SearchConfig,
) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() {
        return Err(Error::InvalidInput("query must not be empty".into()));
    }
    let limit = if limit <= 0 {
        config.default_limit
    } else {
        limit
    };

    let rows = sqlx::query(
        r#"
        SELECT d.collection, d.path, d.title,
               snippet(documents_fts, 2, ?, ?, ?, ?) AS snippet,
               bm25(documents_fts) AS score
        FROM documents_fts
        JOIN documents d ON d.id = documents_fts.rowid
        WHERE documents_fts MATCH ? AND d.active = 1
        ORDER BY score ASC, d.id ASC
        LIMIT ?
        "#,
    )
    .bind(&config.highlight_open)
    .bind(&config.highlight_close)
    .bind(&config.ellipsis)
    .bind(config.snippet_tokens.clamp(1, 64))
    .bind(query)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| classify_query_error(e, query))?;

    debug!("fts query {:?} matched {} rows", query, rows.len());

    Ok(rows
        .iter()
        .map(|row| SearchResult {
            collection: row.get("collection"),
            path: row.get("path"),
            title: row.get("title"),
            snippet: row.get("snippet"),
            score: row.get("score"),
        })
        .collect())
}

/// Regenerate every index row from the catalog and content store.
///
/// The index is derived data; this restores the 1:1 invariant after
/// corruption or manual edits. Returns the number of rows written.
pub async fn rebuild(pool: &SqlitePool) -> Result<u64> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM documents_fts")
        .execute(&mut *tx)
        .await?;
    let written = sqlx::query(
        r#"
        INSERT INTO documents_fts (rowid, filepath, title, body)
        SELECT d.id, d.collection || '/' || d.path, d.title, c.doc
        FROM documents d
        JOIN content c ON c.hash = d.hash
        "#,
    )
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(written)
}

/// FTS5 reports query syntax problems as ordinary database errors; surface
/// those as bad input rather than storage failure.
fn classify_query_error(err: sqlx::Error, query: &str) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        let msg = db_err.message();
        if is_query_syntax_message(msg) {
            return Error::InvalidInput(format!("malformed query {:?}: {}", query, msg));
        }
    }
    Error::Storage(err)
}

fn is_query_syntax_message(msg: &str) -> bool {
    msg.contains("fts5")
        || msg.contains("syntax error")
        || msg.contains("unterminated string")
        || msg.contains("no such column")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_messages_are_recognised() {
        assert!(is_query_syntax_message("fts5: syntax error near \"\""));
        assert!(is_query_syntax_message("unterminated string"));
        assert!(is_query_syntax_message("no such column: foo"));
        assert!(!is_query_syntax_message("database is locked"));
    }
}
