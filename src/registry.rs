//! Collection registry.
//!
//! A collection names a root directory and an include pattern; it is the
//! unit the scanner walks and the first segment of every display path.
//! Names are globally unique.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::info;

use crate::catalog;
use crate::db::now_iso;
use crate::error::{Error, Result};
use crate::models::Collection;
use crate::scanner;

pub const DEFAULT_PATTERN: &str = "**/*.md";

/// Register a collection rooted at `path`.
///
/// The path must be an existing directory; it is stored canonicalised.
/// `pattern` defaults to [`DEFAULT_PATTERN`].
pub async fn add(
    pool: &SqlitePool,
    name: &str,
    path: &Path,
    pattern: Option<&str>,
) -> Result<Collection> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("collection name must not be empty".into()));
    }
    if name.contains('/') {
        return Err(Error::InvalidInput(format!(
            "collection name must not contain '/': {}",
            name
        )));
    }

    let pattern = pattern
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PATTERN);
    scanner::validate_pattern(pattern)?;

    if !path.is_dir() {
        return Err(Error::InvalidInput(format!(
            "not a directory: {}",
            path.display()
        )));
    }
    let root = path.canonicalize()?;
    let root = root.to_string_lossy().to_string();

    let inserted = sqlx::query(
        "INSERT INTO collections (name, path, pattern, created_at) VALUES (?, ?, ?, ?) RETURNING id, name, path, pattern, created_at",
    )
    .bind(name)
    .bind(&root)
    .bind(pattern)
    .bind(now_iso())
    .fetch_one(pool)
    .await;

    match inserted {
        Ok(row) => {
            info!("registered collection {} -> {} ({})", name, root, pattern);
            Ok(collection_from_row(&row))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(Error::already_exists("collection", name))
        }
        Err(e) => Err(e.into()),
    }
}

/// All collections, ordered by name.
pub async fn list(pool: &SqlitePool) -> Result<Vec<Collection>> {
    let rows = sqlx::query(
        "SELECT id, name, path, pattern, created_at FROM collections ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(collection_from_row).collect())
}

pub async fn get(pool: &SqlitePool, name: &str) -> Result<Collection> {
    let row = sqlx::query("SELECT id, name, path, pattern, created_at FROM collections WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    row.map(|r| collection_from_row(&r))
        .ok_or_else(|| Error::not_found("collection", name))
}

/// Unregister a collection, cascading to its catalog and full-text rows.
pub async fn remove(pool: &SqlitePool, name: &str) -> Result<()> {
    catalog::remove_collection(pool, name).await?;
    info!("removed collection {}", name);
    Ok(())
}

fn collection_from_row(row: &SqliteRow) -> Collection {
    let pattern: Option<String> = row.get("pattern");
    let created_at: Option<String> = row.get("created_at");
    Collection {
        id: row.get("id"),
        name: row.get("name"),
        root_path: row.get("path"),
        include_pattern: pattern.unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
        created_at: created_at.unwrap_or_default(),
    }
}
