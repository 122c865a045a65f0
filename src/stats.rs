//! Index status and health overview.

use sqlx::SqlitePool;
use std::path::Path;

use crate::error::Result;
use crate::models::Status;

/// Count what is indexed.
pub async fn status(pool: &SqlitePool, db_path: &Path) -> Result<Status> {
    let collections: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections")
        .fetch_one(pool)
        .await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE active = 1")
        .fetch_one(pool)
        .await?;

    let inactive_docs: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE active = 0")
            .fetch_one(pool)
            .await?;

    let content_blobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content")
        .fetch_one(pool)
        .await?;

    let embeddings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
        .fetch_one(pool)
        .await?;

    Ok(Status {
        db_path: db_path.display().to_string(),
        collections,
        total_docs,
        inactive_docs,
        content_blobs,
        embeddings,
        has_vector_index: embeddings > 0,
    })
}

/// Render a status block the way the CLI prints it.
pub fn format_status(status: &Status) -> String {
    format!(
        "gqmd Index Status:\n  Database: {}\n  Collections: {}\n  Total documents: {}\n  Inactive documents: {}\n  Content blobs: {}\n  Embeddings: {}\n  Has vector index: {}",
        status.db_path,
        status.collections,
        status.total_docs,
        status.inactive_docs,
        status.content_blobs,
        status.embeddings,
        status.has_vector_index,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_empty_index_status() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("index.sqlite");
        let pool = db::open(&db_path).await.unwrap();

        let status = status(&pool, &db_path).await.unwrap();
        assert_eq!(status.db_path, db_path.display().to_string());
        assert_eq!(status.collections, 0);
        assert_eq!(status.total_docs, 0);
        assert!(!status.has_vector_index);

        let text = format_status(&status);
        assert!(text.contains("Total documents: 0"));
        assert!(text.contains("Has vector index: false"));
        pool.close().await;
    }
}
