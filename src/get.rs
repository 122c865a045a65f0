//! Document retrieval by collection and path.
//!
//! [`get_document`] returns one active entry with its body. [`multi_get`]
//! gathers several `"collection/path"` references under a total byte budget,
//! for front ends that hand whole documents to an agent.

use sqlx::{Row, SqlitePool};

use crate::catalog::entry_from_row;
use crate::error::{Error, Result};
use crate::models::{display_path, DocumentResponse};

/// Appended to a body cut short by the byte budget.
pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// Fetch an active document and its content.
pub async fn get_document(
    pool: &SqlitePool,
    collection: &str,
    path: &str,
) -> Result<DocumentResponse> {
    let row = sqlx::query(
        r#"
        SELECT d.id, d.collection, d.path, d.title, d.hash, d.created_at, d.modified_at, d.active,
               c.doc
        FROM documents d
        JOIN content c ON c.hash = d.hash
        WHERE d.collection = ? AND d.path = ? AND d.active = 1
        "#,
    )
    .bind(collection)
    .bind(path)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(DocumentResponse {
            document: entry_from_row(&row),
            content: row.get("doc"),
        }),
        None => Err(Error::not_found("document", display_path(collection, path))),
    }
}

/// Split `"collection/path"` at the first `/`.
pub fn split_display_path(reference: &str) -> Option<(&str, &str)> {
    let (collection, path) = reference.split_once('/')?;
    if collection.is_empty() || path.is_empty() {
        return None;
    }
    Some((collection, path))
}

/// Fetch several documents, at most `max_bytes` of body in total.
///
/// Malformed or missing references are skipped. The body that crosses the
/// budget is cut at a character boundary and gets [`TRUNCATION_MARKER`];
/// collection stops once the budget is spent.
pub async fn multi_get(
    pool: &SqlitePool,
    references: &[String],
    max_bytes: usize,
) -> Result<Vec<DocumentResponse>> {
    let mut results = Vec::new();
    let mut total_bytes = 0usize;

    for reference in references {
        if total_bytes >= max_bytes {
            break;
        }

        let Some((collection, path)) = split_display_path(reference) else {
            continue;
        };

        let mut doc = match get_document(pool, collection, path).await {
            Ok(doc) => doc,
            Err(Error::NotFound { .. }) => continue,
            Err(e) => return Err(e),
        };

        let remaining = max_bytes - total_bytes;
        let len = doc.content.len();
        if len > remaining {
            truncate_at_char_boundary(&mut doc.content, remaining);
            doc.content.push_str(TRUNCATION_MARKER);
        }

        total_bytes += len.min(remaining);
        results.push(doc);
    }

    Ok(results)
}

fn truncate_at_char_boundary(text: &mut String, max_len: usize) {
    if text.len() <= max_len {
        return;
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_display_path() {
        assert_eq!(split_display_path("docs/a.md"), Some(("docs", "a.md")));
        assert_eq!(
            split_display_path("docs/sub/dir/a.md"),
            Some(("docs", "sub/dir/a.md"))
        );
        assert_eq!(split_display_path("no-slash"), None);
        assert_eq!(split_display_path("/a.md"), None);
        assert_eq!(split_display_path("docs/"), None);
    }

    #[test]
    fn test_truncate_respects_utf8() {
        let mut text = "aé".to_string(); // 'é' spans bytes 1..3
        truncate_at_char_boundary(&mut text, 2);
        assert_eq!(text, "a");

        let mut short = "abc".to_string();
        truncate_at_char_boundary(&mut short, 10);
        assert_eq!(short, "abc");
    }
}
