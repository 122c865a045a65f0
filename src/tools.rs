//! Named operation table for front ends.
//!
//! Every engine operation a front end may invoke is a [`Tool`]: a name, a
//! description, a JSON Schema for its parameters, and an async handler that
//! takes JSON in and returns JSON out. [`ToolRegistry::with_builtins`]
//! builds the table once; [`ToolRegistry::call`] dispatches by name.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                ToolRegistry                  │
//! │  status  search  get  multi_get              │
//! │  vector_search  query                        │
//! └──────────────┬───────────────────────────────┘
//!                ▼
//!        execute(params, &ToolContext)
//! ```
//!
//! Failures are returned as [`Error`]; [`error_body`] renders one in the
//! `{ "error": { "code", "message" } }` shape front ends emit.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::{fts, get, search, stats, vector};

/// A named operation exposed to front ends.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, e.g. `"multi_get"`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) for the parameters.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// What a tool handler can reach: the pool, the loaded config, and the
/// embedder if one is configured.
pub struct ToolContext {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub db_path: PathBuf,
    pub embedder: Option<Arc<dyn Embedder>>,
}

impl ToolContext {
    /// Build a context, creating the configured embedder when enabled.
    pub fn new(pool: SqlitePool, config: Arc<Config>, db_path: PathBuf) -> Result<Self> {
        let embedder: Option<Arc<dyn Embedder>> = if config.embedding.is_enabled() {
            Some(Arc::from(create_embedder(&config.embedding)?))
        } else {
            None
        };
        Ok(Self {
            pool,
            config,
            db_path,
            embedder,
        })
    }

    pub fn with_embedder(mut self, embedder: Option<Arc<dyn Embedder>>) -> Self {
        self.embedder = embedder;
        self
    }

    fn embedder(&self) -> Option<&dyn Embedder> {
        self.embedder.as_deref()
    }
}

fn parse_params<T: DeserializeOwned>(tool: &str, params: Value) -> Result<T> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params)
        .map_err(|e| Error::InvalidInput(format!("{}: invalid parameters: {}", tool, e)))
}

/// Render an error as a front-end response body.
pub fn error_body(err: &Error) -> Value {
    json!({ "error": { "code": err.kind(), "message": err.to_string() } })
}

// ============ Built-in tools ============

pub struct StatusTool;

#[async_trait]
impl Tool for StatusTool {
    fn name(&self) -> &str {
        "status"
    }

    fn description(&self) -> &str {
        "Report collection, document, content and embedding counts"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let status = stats::status(&ctx.pool, &ctx.db_path).await?;
        Ok(json!(status))
    }
}

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default)]
    limit: i64,
}

pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Full-text search over active documents (BM25, lower score is better)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "FTS5 query: terms or \"quoted phrases\"" },
                "limit": { "type": "integer", "description": "Max results (0 = configured default)", "default": 0 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: SearchParams = parse_params(self.name(), params)?;
        let results = fts::search(&ctx.pool, &p.query, p.limit, &ctx.config.search).await?;
        Ok(json!({ "results": results }))
    }
}

#[derive(Deserialize)]
struct GetParams {
    collection: String,
    path: String,
}

pub struct GetTool;

#[async_trait]
impl Tool for GetTool {
    fn name(&self) -> &str {
        "get"
    }

    fn description(&self) -> &str {
        "Retrieve an active document and its body by collection and path"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "collection": { "type": "string" },
                "path": { "type": "string", "description": "Path relative to the collection root" }
            },
            "required": ["collection", "path"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: GetParams = parse_params(self.name(), params)?;
        let doc = get::get_document(&ctx.pool, &p.collection, &p.path).await?;
        Ok(json!(doc))
    }
}

#[derive(Deserialize)]
struct MultiGetParams {
    paths: Vec<String>,
    #[serde(default)]
    max_bytes: usize,
}

pub struct MultiGetTool;

#[async_trait]
impl Tool for MultiGetTool {
    fn name(&self) -> &str {
        "multi_get"
    }

    fn description(&self) -> &str {
        "Retrieve several documents by \"collection/path\" under a total byte budget"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": { "type": "array", "items": { "type": "string" } },
                "max_bytes": { "type": "integer", "description": "Body byte budget (0 = configured default)", "default": 0 }
            },
            "required": ["paths"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: MultiGetParams = parse_params(self.name(), params)?;
        let max_bytes = if p.max_bytes == 0 {
            ctx.config.get.max_bytes
        } else {
            p.max_bytes
        };
        let docs = get::multi_get(&ctx.pool, &p.paths, max_bytes).await?;
        Ok(json!({ "documents": docs }))
    }
}

#[derive(Deserialize)]
struct TextQueryParams {
    query: String,
    #[serde(default)]
    limit: i64,
}

pub struct VectorSearchTool;

#[async_trait]
impl Tool for VectorSearchTool {
    fn name(&self) -> &str {
        "vector_search"
    }

    fn description(&self) -> &str {
        "Semantic search by cosine similarity (requires an embedding provider)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "limit": { "type": "integer", "default": 0 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: TextQueryParams = parse_params(self.name(), params)?;
        let embedder = ctx.embedder().ok_or_else(|| {
            Error::EmbeddingUnavailable("no embedding provider configured".into())
        })?;
        let limit = if p.limit <= 0 {
            ctx.config.search.default_limit
        } else {
            p.limit
        };
        let results = vector::search_text(&ctx.pool, embedder, &p.query, limit).await?;
        Ok(json!({ "results": results }))
    }
}

pub struct QueryTool;

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        "query"
    }

    fn description(&self) -> &str {
        "Lexical search plus semantic search when embeddings are available"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "limit": { "type": "integer", "default": 0 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: TextQueryParams = parse_params(self.name(), params)?;
        let response = search::query(
            &ctx.pool,
            ctx.embedder(),
            &p.query,
            p.limit,
            &ctx.config.search,
        )
        .await?;
        Ok(json!(response))
    }
}

// ============ Registry ============

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry holding every built-in operation.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(StatusTool));
        registry.register(Box::new(SearchTool));
        registry.register(Box::new(GetTool));
        registry.register(Box::new(MultiGetTool));
        registry.register(Box::new(VectorSearchTool));
        registry.register(Box::new(QueryTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Dispatch `name` with `params`; unknown names are `NotFound`.
    pub async fn call(&self, name: &str, params: Value, ctx: &ToolContext) -> Result<Value> {
        let tool = self
            .find(name)
            .ok_or_else(|| Error::not_found("tool", name))?;
        tool.execute(params, ctx).await
    }

    /// `{ "tools": [{ name, description, parameters }] }` for discovery.
    pub fn describe(&self) -> Value {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.parameters_schema(),
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered_once() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 6);
        for name in ["status", "search", "get", "multi_get", "vector_search", "query"] {
            assert!(registry.find(name).is_some(), "missing {}", name);
        }
        assert!(registry.find("sources").is_none());
    }

    #[test]
    fn test_schemas_are_objects() {
        let registry = ToolRegistry::with_builtins();
        for tool in registry.tools() {
            assert_eq!(tool.parameters_schema()["type"], "object", "{}", tool.name());
        }
        let described = registry.describe();
        assert_eq!(described["tools"].as_array().map(|a| a.len()), Some(6));
    }

    #[test]
    fn test_error_body_shape() {
        let body = error_body(&Error::not_found("document", "docs/a.md"));
        assert_eq!(body["error"]["code"], "not_found");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("docs/a.md"));
    }

    #[test]
    fn test_parse_params_rejects_missing_field() {
        let err = parse_params::<GetParams>("get", json!({ "collection": "docs" }))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "invalid_input");
    }
}
