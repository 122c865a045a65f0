//! Vector index: per-(content hash, chunk) embeddings and exhaustive
//! cosine-similarity search.
//!
//! Vectors are stored as little-endian `f32` BLOBs. Search streams every
//! embedding row joined to active catalog entries sharing its content hash,
//! scores it against the query straight from the BLOB bytes (no per-row
//! decode allocation), and keeps the best `limit` candidates in a bounded
//! min-heap.
//!
//! ```text
//!            a · b
//! cos(θ) = ─────────      0 when either norm is 0 or the lengths differ
//!          ‖a‖ × ‖b‖
//! ```

use futures::TryStreamExt;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tracing::debug;

use crate::db::now_iso;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::models::{EmbeddingEntry, VectorResult};

const DEFAULT_LIMIT: i64 = 10;

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, zero-norm
/// input, or non-finite results. Never panics.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    cosine_from_parts(a.iter().copied().zip(b.iter().copied()))
}

/// [`cosine_similarity`] against a vector still in BLOB form.
pub fn cosine_similarity_blob(query: &[f32], blob: &[u8]) -> f64 {
    if blob.len() % 4 != 0 || blob.len() / 4 != query.len() {
        return 0.0;
    }
    let stored = blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]));
    cosine_from_parts(query.iter().copied().zip(stored))
}

fn cosine_from_parts(pairs: impl Iterator<Item = (f32, f32)>) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in pairs {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() {
        sim.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Store the embedding for `(content_hash, chunk_index)`, replacing any
/// existing vector at that key.
pub async fn store(
    pool: &SqlitePool,
    content_hash: &str,
    chunk_index: i64,
    model: &str,
    vector: &[f32],
) -> Result<()> {
    let mut conn = pool.acquire().await?;
    store_on(&mut *conn, content_hash, chunk_index, model, vector).await
}

/// [`store`] on an existing connection, so a caller can write all chunks
/// of one blob in a single transaction.
pub(crate) async fn store_on(
    conn: &mut SqliteConnection,
    content_hash: &str,
    chunk_index: i64,
    model: &str,
    vector: &[f32],
) -> Result<()> {
    if vector.is_empty() {
        return Err(Error::InvalidInput("embedding vector must not be empty".into()));
    }
    if chunk_index < 0 {
        return Err(Error::InvalidInput(format!(
            "chunk index must be >= 0, got {}",
            chunk_index
        )));
    }

    sqlx::query(
        r#"
        INSERT OR REPLACE INTO embeddings (hash, chunk_idx, model, dimensions, vector, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(content_hash)
    .bind(chunk_index)
    .bind(model)
    .bind(vector.len() as i64)
    .bind(vec_to_blob(vector))
    .bind(now_iso())
    .execute(conn)
    .await?;

    Ok(())
}

/// All embeddings stored for one content hash, ordered by chunk.
pub async fn embeddings_for(pool: &SqlitePool, content_hash: &str) -> Result<Vec<EmbeddingEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT hash, chunk_idx, model, dimensions, vector, created_at
        FROM embeddings WHERE hash = ? ORDER BY chunk_idx
        "#,
    )
    .bind(content_hash)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("vector");
            EmbeddingEntry {
                content_hash: row.get("hash"),
                chunk_index: row.get("chunk_idx"),
                model_name: row.get("model"),
                dimensionality: row.get("dimensions"),
                vector: blob_to_vec(&blob),
                created_at: row.get("created_at"),
            }
        })
        .collect())
}

/// A scored candidate. Ordered so that "greater" means "ranks higher":
/// higher score first, then earlier position in the scan.
#[derive(Debug)]
struct Candidate {
    score: f64,
    seq: u64,
    result: VectorResult,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Keeps the best `limit` candidates seen so far.
struct TopK {
    limit: usize,
    heap: BinaryHeap<Reverse<Candidate>>,
}

impl TopK {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            heap: BinaryHeap::new(),
        }
    }

    /// Would a candidate with this rank make the cut?
    fn admits(&self, score: f64, seq: u64) -> bool {
        if self.limit == 0 {
            return false;
        }
        if self.heap.len() < self.limit {
            return true;
        }
        match self.heap.peek() {
            Some(Reverse(worst)) => {
                score.total_cmp(&worst.score).then_with(|| worst.seq.cmp(&seq)) == Ordering::Greater
            }
            None => true,
        }
    }

    fn push(&mut self, candidate: Candidate) {
        self.heap.push(Reverse(candidate));
        if self.heap.len() > self.limit {
            self.heap.pop();
        }
    }

    /// Best first.
    fn into_sorted(self) -> Vec<VectorResult> {
        let mut items: Vec<Candidate> = self.heap.into_iter().map(|Reverse(c)| c).collect();
        items.sort_by(|a, b| b.cmp(a));
        items.into_iter().map(|c| c.result).collect()
    }
}

/// Rank active documents by cosine similarity to `query`, best first.
///
/// Ties keep the order in which embedding rows were inserted. `limit <= 0`
/// uses a default of 10.
pub async fn search(pool: &SqlitePool, query: &[f32], limit: i64) -> Result<Vec<VectorResult>> {
    let limit = if limit <= 0 { DEFAULT_LIMIT } else { limit };
    let mut top = TopK::new(limit as usize);

    let mut rows = sqlx::query(
        r#"
        SELECT e.chunk_idx, e.vector, d.collection, d.path, d.title
        FROM embeddings e
        JOIN documents d ON d.hash = e.hash AND d.active = 1
        ORDER BY e.rowid, d.id
        "#,
    )
    .fetch(pool);

    let mut seq = 0u64;
    while let Some(row) = rows.try_next().await? {
        let blob: &[u8] = row.try_get("vector")?;
        let score = cosine_similarity_blob(query, blob);

        if top.admits(score, seq) {
            top.push(Candidate {
                score,
                seq,
                result: VectorResult {
                    collection: row.try_get("collection")?,
                    path: row.try_get("path")?,
                    title: row.try_get("title")?,
                    chunk_index: row.try_get("chunk_idx")?,
                    score,
                },
            });
        }
        seq += 1;
    }

    debug!("vector search scored {} rows", seq);
    Ok(top.into_sorted())
}

/// Embed `text` with `embedder` and run [`search`] with the result.
pub async fn search_text(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    text: &str,
    limit: i64,
) -> Result<Vec<VectorResult>> {
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("query must not be empty".into()));
    }
    let query = embedder.embed(text).await?;
    search(pool, &query, limit).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(path: &str) -> VectorResult {
        VectorResult {
            collection: "docs".to_string(),
            path: path.to_string(),
            title: path.to_string(),
            chunk_index: 0,
            score: 0.0,
        }
    }

    fn feed(limit: usize, scores: &[f64]) -> Vec<String> {
        let mut top = TopK::new(limit);
        for (seq, &score) in scores.iter().enumerate() {
            let seq = seq as u64;
            if top.admits(score, seq) {
                top.push(Candidate {
                    score,
                    seq,
                    result: result(&format!("p{}", seq)),
                });
            }
        }
        top.into_sorted().into_iter().map(|r| r.path).collect()
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_degenerate_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_bounds_hold_for_large_values() {
        let pairs = [
            (vec![1e30f32, 1e30], vec![1e30f32, 1e30]),
            (vec![3.0, -7.0, 0.5], vec![-2.0, 4.0, 9.0]),
            (vec![1e-30f32, 2e-30], vec![5e-30f32, -1e-30]),
        ];
        for (a, b) in &pairs {
            let sim = cosine_similarity(a, b);
            assert!((-1.0..=1.0).contains(&sim), "out of range: {}", sim);
        }
    }

    #[test]
    fn test_blob_cosine_matches_decoded() {
        let a = vec![0.3f32, -1.2, 4.0];
        let b = vec![1.0f32, 0.5, -0.25];
        let expected = cosine_similarity(&a, &b);
        assert!((cosine_similarity_blob(&a, &vec_to_blob(&b)) - expected).abs() < 1e-12);
        assert_eq!(cosine_similarity_blob(&a, &[0u8; 7]), 0.0);
        assert_eq!(cosine_similarity_blob(&a, &vec_to_blob(&[1.0, 2.0])), 0.0);
    }

    #[test]
    fn test_top_k_keeps_best_descending() {
        assert_eq!(feed(2, &[0.1, 0.9, 0.5, 0.7]), vec!["p1", "p3"]);
    }

    #[test]
    fn test_top_k_ties_keep_insertion_order() {
        assert_eq!(feed(3, &[0.5, 0.5, 0.5, 0.5]), vec!["p0", "p1", "p2"]);
        assert_eq!(feed(2, &[0.2, 0.8, 0.8]), vec!["p1", "p2"]);
    }

    #[test]
    fn test_top_k_matches_full_sort() {
        let scores = [0.3, -0.2, 0.9, 0.9, 0.0, 0.45, -1.0, 0.45, 0.8];
        let mut expected: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
        expected.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let expected: Vec<String> = expected
            .iter()
            .take(4)
            .map(|(i, _)| format!("p{}", i))
            .collect();
        assert_eq!(feed(4, &scores), expected);
    }

    #[test]
    fn test_top_k_zero_limit() {
        assert!(feed(0, &[0.5]).is_empty());
    }

    #[test]
    fn test_top_k_huge_limit_does_not_preallocate() {
        assert_eq!(feed(usize::MAX, &[0.1, 0.9]), vec!["p1", "p0"]);
    }
}
