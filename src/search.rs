//! Combined lexical + semantic query.
//!
//! Lexical hits always come from the full-text index. Semantic hits are
//! added when an [`Embedder`] is configured and reachable; otherwise the
//! query degrades to lexical-only and the response says so by leaving
//! `semantic` as `None`.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::config::SearchConfig;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::fts;
use crate::models::{SearchResult, VectorResult};
use crate::vector;

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub lexical: Vec<SearchResult>,
    /// `None` when no embedder is available.
    pub semantic: Option<Vec<VectorResult>>,
}

impl QueryResponse {
    pub fn is_lexical_only(&self) -> bool {
        self.semantic.is_none()
    }
}

pub async fn query(
    pool: &SqlitePool,
    embedder: Option<&dyn Embedder>,
    text: &str,
    limit: i64,
    config: &SearchConfig,
) -> Result<QueryResponse> {
    let limit = if limit <= 0 {
        config.default_limit
    } else {
        limit
    };

    let lexical = fts::search(pool, text, limit, config).await?;

    let semantic = match embedder {
        None => {
            warn!("no embedder configured; returning lexical results only");
            None
        }
        Some(embedder) => match vector::search_text(pool, embedder, text, limit).await {
            Ok(hits) => Some(hits),
            Err(Error::EmbeddingUnavailable(msg)) => {
                warn!("embeddings unavailable ({}); returning lexical results only", msg);
                None
            }
            Err(e) => return Err(e),
        },
    };

    Ok(QueryResponse { lexical, semantic })
}
