use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::migrate;

const APP_DIR: &str = "gqmd";
const DB_FILE: &str = "index.sqlite";

/// Resolve the index location: `$XDG_CACHE_HOME/gqmd/index.sqlite`, falling
/// back to `~/.cache/gqmd/index.sqlite`.
pub fn default_db_path() -> Result<PathBuf> {
    let cache_dir = match std::env::var_os("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .ok_or_else(|| Error::InvalidInput("cannot determine home directory".into()))?
            .join(".cache"),
    };
    Ok(cache_dir.join(APP_DIR).join(DB_FILE))
}

/// The configured path if set, otherwise [`default_db_path`].
pub fn resolve_db_path(config: &Config) -> Result<PathBuf> {
    match &config.db.path {
        Some(path) => Ok(path.clone()),
        None => default_db_path(),
    }
}

pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        create_private_dir(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    debug!("Opened index at {}", db_path.display());
    Ok(pool)
}

/// Current UTC time in the RFC 3339 form stored in every `*_at` column.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Connect and make sure the schema exists.
pub async fn open(db_path: &Path) -> Result<SqlitePool> {
    let pool = connect(db_path).await?;
    migrate::run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_file_and_parent() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("index.sqlite");

        let pool = open(&db_path).await.unwrap();
        assert!(db_path.exists(), "database file was not created");
        pool.close().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_parent_dir_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cache").join("gqmd");
        let pool = open(&dir.join("index.sqlite")).await.unwrap();
        let mode = std::fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
        pool.close().await;
    }

    #[test]
    fn test_configured_path_wins() {
        let mut config = Config::default();
        config.db.path = Some(PathBuf::from("/tmp/elsewhere.sqlite"));
        assert_eq!(
            resolve_db_path(&config).unwrap(),
            PathBuf::from("/tmp/elsewhere.sqlite")
        );
    }
}
