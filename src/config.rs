use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Engine configuration. Every section is optional in the TOML file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub get: GetConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DbConfig {
    /// Overrides the XDG cache location when set.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_snippet_tokens")]
    pub snippet_tokens: i64,
    #[serde(default = "default_highlight_open")]
    pub highlight_open: String,
    #[serde(default = "default_highlight_close")]
    pub highlight_close: String,
    #[serde(default = "default_ellipsis")]
    pub ellipsis: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            snippet_tokens: default_snippet_tokens(),
            highlight_open: default_highlight_open(),
            highlight_close: default_highlight_close(),
            ellipsis: default_ellipsis(),
        }
    }
}

fn default_limit() -> i64 {
    10
}
fn default_snippet_tokens() -> i64 {
    32
}
fn default_highlight_open() -> String {
    "<mark>".to_string()
}
fn default_highlight_close() -> String {
    "</mark>".to_string()
}
fn default_ellipsis() -> String {
    "...".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GetConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for GetConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_max_bytes() -> usize {
    10 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    512
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            url: default_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load the config at `path` if given, otherwise fall back to defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => Ok(Config::default()),
    }
}

fn validate(config: &Config) -> Result<()> {
    // FTS5's snippet() accepts at most 64 tokens
    if !(1..=64).contains(&config.search.snippet_tokens) {
        anyhow::bail!("search.snippet_tokens must be in [1, 64]");
    }

    if config.search.default_limit < 1 {
        anyhow::bail!("search.default_limit must be >= 1");
    }

    if config.get.max_bytes == 0 {
        anyhow::bail!("get.max_bytes must be > 0");
    }

    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or ollama.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, body: &str) -> PathBuf {
        let path = tmp.path().join("gqmd.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&write_config(&tmp, "")).unwrap();
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.search.snippet_tokens, 32);
        assert_eq!(config.search.highlight_open, "<mark>");
        assert_eq!(config.get.max_bytes, 10 * 1024);
        assert!(!config.embedding.is_enabled());
        assert!(config.db.path.is_none());
    }

    #[test]
    fn test_overrides() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&write_config(
            &tmp,
            r#"
[db]
path = "/tmp/custom.sqlite"

[search]
snippet_tokens = 16
highlight_open = "**"
highlight_close = "**"

[embedding]
provider = "ollama"
model = "all-minilm"
"#,
        ))
        .unwrap();
        assert_eq!(config.db.path, Some(PathBuf::from("/tmp/custom.sqlite")));
        assert_eq!(config.search.snippet_tokens, 16);
        assert_eq!(config.search.highlight_close, "**");
        assert!(config.embedding.is_enabled());
        assert_eq!(config.embedding.model, "all-minilm");
        assert_eq!(config.embedding.url, "http://localhost:11434");
    }

    #[test]
    fn test_rejects_oversized_snippet() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(&write_config(&tmp, "[search]\nsnippet_tokens = 65\n")).unwrap_err();
        assert!(err.to_string().contains("snippet_tokens"));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let tmp = TempDir::new().unwrap();
        let err =
            load_config(&write_config(&tmp, "[embedding]\nprovider = \"magic\"\n")).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_config(&tmp.path().join("nope.toml")).is_err());
        assert!(load_or_default(None).is_ok());
    }
}
