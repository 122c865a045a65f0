//! Core data models used throughout the engine.
//!
//! These types mirror the persisted rows (collections, content, documents,
//! embeddings) and the structured results handed back to front ends.

use serde::Serialize;
use std::collections::BTreeMap;

/// A named root directory plus an include pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub root_path: String,
    pub include_pattern: String,
    pub created_at: String,
}

/// Catalog record for one (collection, relative path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentEntry {
    pub id: i64,
    pub collection: String,
    pub path: String,
    pub title: String,
    pub content_hash: String,
    pub created_at: String,
    pub modified_at: String,
    pub active: bool,
}

impl DocumentEntry {
    /// `"<collection>/<path>"`, the form stored in the full-text index and
    /// accepted by multi-get.
    pub fn display_path(&self) -> String {
        display_path(&self.collection, &self.path)
    }
}

pub fn display_path(collection: &str, path: &str) -> String {
    format!("{}/{}", collection, path)
}

/// A single embedding row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingEntry {
    pub content_hash: String,
    pub chunk_index: i64,
    pub model_name: String,
    pub dimensionality: i64,
    pub vector: Vec<f32>,
    pub created_at: String,
}

/// A lexical hit. `score` is the raw FTS5 bm25 value: lower is better.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub collection: String,
    pub path: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
}

/// A semantic hit. `score` is cosine similarity: higher is better.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorResult {
    pub collection: String,
    pub path: String,
    pub title: String,
    pub chunk_index: i64,
    pub score: f64,
}

/// Outcome of one scanner pass over a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
    pub errors: u64,
}

impl ScanSummary {
    /// Some files could not be indexed; the rest of the pass still applied.
    pub fn is_partial(&self) -> bool {
        self.errors > 0
    }

    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

/// Summaries for a scan over every registered collection, keyed by name.
pub type ScanReport = BTreeMap<String, ScanSummary>;

/// A document body together with its catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentResponse {
    pub document: DocumentEntry,
    pub content: String,
}

/// Index health overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub db_path: String,
    pub collections: i64,
    pub total_docs: i64,
    pub inactive_docs: i64,
    pub content_blobs: i64,
    pub embeddings: i64,
    pub has_vector_index: bool,
}
