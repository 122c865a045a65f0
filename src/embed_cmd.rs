//! Out-of-band embedding pipeline.
//!
//! Finds content blobs that back at least one active entry but have no
//! vectors yet, chunks them, and stores one embedding per chunk. The
//! scanner never calls this; it runs when the caller asks for it.

use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::chunk::chunk_text;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::vector;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmbedSummary {
    /// Content blobs fully embedded in this run.
    pub documents: u64,
    /// Vectors written.
    pub chunks: u64,
    /// Blobs still lacking vectors when the run ended.
    pub pending: u64,
}

/// Content hashes referenced by active entries that have no embeddings.
pub async fn find_pending(pool: &SqlitePool, limit: Option<usize>) -> Result<Vec<String>> {
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let hashes = sqlx::query_scalar(
        r#"
        SELECT DISTINCT d.hash
        FROM documents d
        WHERE d.active = 1
          AND NOT EXISTS (SELECT 1 FROM embeddings e WHERE e.hash = d.hash)
        ORDER BY d.hash
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(hashes)
}

/// Embed every pending blob.
///
/// Stops at the first [`Error::EmbeddingUnavailable`] and reports what is
/// left as pending; the lexical index is unaffected either way.
pub async fn embed_pending(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    max_tokens: usize,
    limit: Option<usize>,
) -> Result<EmbedSummary> {
    let pending = find_pending(pool, limit).await?;
    let mut summary = EmbedSummary {
        pending: pending.len() as u64,
        ..Default::default()
    };

    for hash in &pending {
        let body: String = sqlx::query("SELECT doc FROM content WHERE hash = ?")
            .bind(hash)
            .fetch_one(pool)
            .await?
            .get("doc");

        let chunks = chunk_text(&body, max_tokens);
        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            match embedder.embed(chunk).await {
                Ok(v) => vectors.push(v),
                Err(Error::EmbeddingUnavailable(msg)) => {
                    warn!("embedding unavailable, stopping: {}", msg);
                    return Ok(summary);
                }
                Err(e) => return Err(e),
            }
        }

        // One transaction per blob: a blob is never half-embedded
        let mut tx = pool.begin().await?;
        for (idx, v) in vectors.iter().enumerate() {
            vector::store_on(&mut *tx, hash, idx as i64, embedder.model_name(), v).await?;
        }
        tx.commit().await?;
        summary.documents += 1;
        summary.chunks += vectors.len() as u64;
        summary.pending -= 1;
    }

    info!(
        "embedded {} documents ({} chunks), {} pending",
        summary.documents, summary.chunks, summary.pending
    );
    Ok(summary)
}
