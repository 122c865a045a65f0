//! Directory scanner: walks a collection root and brings the catalog in line
//! with what is on disk.
//!
//! One pass = one call to [`scan_collection`]. Each matching file is hashed,
//! titled, and upserted (content + catalog + full-text in one transaction).
//! Paths that were active but were not observed during the pass are
//! soft-deleted afterwards. Per-file failures are counted in
//! [`ScanSummary::errors`] and never abort the pass.
//!
//! A walk error keeps existing entries from being soft-deleted: for the root
//! that means the whole collection, for a subdirectory everything beneath it.
//!
//! # Include patterns
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `**/*.ext` | any file under the root whose path ends in `.ext` |
//! | `*.ext` | the same: by extension, at any depth |
//! | anything else | shell glob against the **file name only** |
//!
//! The fallback is deliberately not recursive: `notes-*.md` matches
//! `a/b/notes-1.md`, but a pattern such as `docs/*.md` can never match
//! because a file name holds no separator. [`validate_pattern`] rejects such
//! patterns up front.

use globset::{GlobBuilder, GlobMatcher};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::catalog::{self, Change};
use crate::error::{Error, Result};
use crate::models::{ScanReport, ScanSummary};
use crate::registry;

/// How many leading lines are searched for a `# ` heading.
const TITLE_SCAN_LINES: usize = 3;

/// Compiled form of a collection's include pattern.
#[derive(Debug, Clone)]
pub enum PatternMatcher {
    /// `**/*.ext` and `*.ext`: match the relative path's suffix.
    Suffix(String),
    /// Everything else: glob against the file name.
    FileName(GlobMatcher),
    /// A pattern that cannot match any file name.
    Never,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Self {
        if let Some(suffix) = extension_suffix(pattern) {
            return PatternMatcher::Suffix(suffix.to_string());
        }
        if pattern.is_empty() || pattern.contains('/') {
            return PatternMatcher::Never;
        }
        match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(glob) => PatternMatcher::FileName(glob.compile_matcher()),
            Err(_) => PatternMatcher::Never,
        }
    }

    /// Test a `/`-separated path relative to the collection root.
    pub fn is_match(&self, rel_path: &str) -> bool {
        match self {
            PatternMatcher::Suffix(suffix) => rel_path.ends_with(suffix.as_str()),
            PatternMatcher::FileName(glob) => {
                let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
                glob.is_match(name)
            }
            PatternMatcher::Never => false,
        }
    }
}

/// `".md"` for `**/*.md` or `*.md`; `None` when the extension part holds
/// glob syntax of its own.
fn extension_suffix(pattern: &str) -> Option<&str> {
    let rest = pattern.strip_prefix("**/").unwrap_or(pattern);
    let suffix = rest.strip_prefix('*')?;
    if !suffix.starts_with('.') || suffix.contains(['*', '?', '[', '{', '\\', '/']) {
        return None;
    }
    Some(suffix)
}

pub fn matches_pattern(pattern: &str, rel_path: &str) -> bool {
    PatternMatcher::new(pattern).is_match(rel_path)
}

/// Reject patterns that are empty, malformed, or can never match.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(Error::InvalidInput("include pattern must not be empty".into()));
    }
    if extension_suffix(pattern).is_some() {
        return Ok(());
    }
    if pattern.contains('/') {
        return Err(Error::InvalidInput(format!(
            "pattern {:?} would never match: only **/*.ext and *.ext see directories, other patterns match the file name alone",
            pattern
        )));
    }
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|_| ())
        .map_err(|e| Error::InvalidInput(format!("invalid pattern {:?}: {}", pattern, e)))
}

/// Title from the first `# ` heading within the first few lines, otherwise
/// the file name without its extension.
pub fn extract_title(body: &str, rel_path: &str) -> String {
    for line in body.lines().take(TITLE_SCAN_LINES) {
        let line = line.trim_start_matches('\u{feff}').trim();
        if let Some(heading) = line.strip_prefix("# ") {
            let heading = heading.trim();
            if !heading.is_empty() {
                return heading.to_string();
            }
        }
    }

    Path::new(rel_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| rel_path.to_string())
}

/// Run one pass over collection `name`.
///
/// Fails only when the collection is not registered (or the catalog itself
/// cannot be read); everything file-level is absorbed into the summary.
pub async fn scan_collection(pool: &SqlitePool, name: &str) -> Result<ScanSummary> {
    let collection = registry::get(pool, name).await?;
    let root = Path::new(&collection.root_path);
    let matcher = PatternMatcher::new(&collection.include_pattern);

    let mut summary = ScanSummary::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut root_failed = false;
    // Entries or directories the walk could not look into
    let mut unwalked: Vec<String> = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if e.depth() == 0 {
                    root_failed = true;
                } else if let Some(rel) = e.path().and_then(|p| p.strip_prefix(root).ok()) {
                    unwalked.push(to_slash_path(rel));
                }
                warn!("{}: walk error: {}", collection.name, e);
                summary.errors += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel_path = match entry.path().strip_prefix(root) {
            Ok(rel) => to_slash_path(rel),
            Err(_) => {
                summary.errors += 1;
                continue;
            }
        };

        if !matcher.is_match(&rel_path) {
            continue;
        }

        // Observed, even if it fails below: a file we cannot read still exists.
        seen.insert(rel_path.clone());

        let bytes = match std::fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{}/{}: read failed: {}", collection.name, rel_path, e);
                summary.errors += 1;
                continue;
            }
        };

        let body = match String::from_utf8(bytes) {
            Ok(body) => body,
            Err(_) => {
                warn!("{}/{}: not valid UTF-8, skipped", collection.name, rel_path);
                summary.errors += 1;
                continue;
            }
        };

        let title = extract_title(&body, &rel_path);

        match catalog::upsert(pool, &collection.name, &rel_path, &title, &body).await {
            Ok(outcome) => match outcome.change {
                Change::Added => summary.added += 1,
                Change::Updated => summary.updated += 1,
                Change::Unchanged => {}
            },
            Err(e) => {
                warn!("{}/{}: index failed: {}", collection.name, rel_path, e);
                summary.errors += 1;
            }
        }
    }

    if root_failed {
        warn!(
            "{}: root {} could not be walked; keeping existing entries",
            collection.name, collection.root_path
        );
    } else {
        let missing: Vec<String> = catalog::active_paths(pool, &collection.name)
            .await?
            .into_iter()
            .filter(|p| !seen.contains(p) && !is_under_any(p, &unwalked))
            .collect();
        summary.removed = catalog::mark_inactive(pool, &collection.name, &missing).await?;
    }

    info!(
        "scan {}: added={} updated={} removed={} errors={}",
        collection.name, summary.added, summary.updated, summary.removed, summary.errors
    );
    Ok(summary)
}

/// Scan every registered collection in name order.
pub async fn scan_all(pool: &SqlitePool) -> Result<ScanReport> {
    let mut report = ScanReport::new();
    for collection in registry::list(pool).await? {
        let summary = scan_collection(pool, &collection.name).await?;
        report.insert(collection.name, summary);
    }
    Ok(report)
}

/// `path` is one of `prefixes` or lies beneath one of them.
fn is_under_any(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        path.strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

fn to_slash_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recursive_extension_pattern() {
        assert!(matches_pattern("**/*.md", "a.md"));
        assert!(matches_pattern("**/*.md", "deep/nested/dir/b.md"));
        assert!(!matches_pattern("**/*.md", "notes.txt"));
        assert!(!matches_pattern("**/*.md", "a.mdx"));
    }

    #[test]
    fn test_bare_extension_pattern_matches_any_depth() {
        assert!(matches_pattern("*.txt", "top.txt"));
        assert!(matches_pattern("*.txt", "sub/dir/inner.txt"));
        assert!(!matches_pattern("*.txt", "sub/inner.md"));
    }

    #[test]
    fn test_fallback_matches_file_name_only() {
        assert!(matches_pattern("notes-*.md", "notes-1.md"));
        assert!(matches_pattern("notes-*.md", "a/b/notes-2.md"));
        assert!(!matches_pattern("notes-*.md", "other.md"));
        assert!(matches_pattern("README", "sub/README"));
        assert!(matches_pattern("*.{md,txt}", "x/y.txt"));
        assert!(matches_pattern("?.md", "q/a.md"));
    }

    #[test]
    fn test_fallback_has_no_recursive_semantics() {
        assert!(!matches_pattern("docs/*.md", "docs/a.md"));
        assert!(!matches_pattern("**/notes-*.md", "notes-1.md"));
        assert!(!matches_pattern("[", "["));
    }

    #[test]
    fn test_validate_pattern() {
        assert!(validate_pattern("**/*.md").is_ok());
        assert!(validate_pattern("*.txt").is_ok());
        assert!(validate_pattern("notes-*.md").is_ok());
        assert!(matches!(validate_pattern(""), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_pattern("docs/*.md"), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_pattern("a[.md"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_title_from_heading() {
        assert_eq!(extract_title("# Hello\nworld", "a.md"), "Hello");
        assert_eq!(extract_title("\n  #   Spaced Out  \nbody", "a.md"), "Spaced Out");
        assert_eq!(extract_title("\u{feff}# With BOM\n", "a.md"), "With BOM");
    }

    #[test]
    fn test_title_falls_back_to_file_stem() {
        assert_eq!(extract_title("no heading here", "dir/my-note.md"), "my-note");
        assert_eq!(extract_title("## Second level\n", "x.md"), "x");
        assert_eq!(extract_title("#NoSpace\n", "y.md"), "y");
        assert_eq!(extract_title("one\ntwo\nthree\n# Too late", "z.md"), "z");
        assert_eq!(extract_title("", "archive.tar.gz"), "archive.tar");
    }

    #[test]
    fn test_is_under_any() {
        let prefixes = vec!["locked".to_string(), "a/b.md".to_string()];
        assert!(is_under_any("locked/x.md", &prefixes));
        assert!(is_under_any("locked/deep/y.md", &prefixes));
        assert!(is_under_any("a/b.md", &prefixes));
        assert!(!is_under_any("locked-not/x.md", &prefixes));
        assert!(!is_under_any("a/b.mdx", &prefixes));
        assert!(!is_under_any("other.md", &[]));
    }

    #[test]
    fn test_slash_path() {
        assert_eq!(to_slash_path(Path::new("a/b/c.md")), "a/b/c.md");
        assert_eq!(to_slash_path(Path::new("c.md")), "c.md");
    }
}
