//! Import Command
//!
//! Load markdown documents into the SQLite document store.
//!
//! Each file may start with a YAML front matter block:
//!
//! ```text
//! ---
//! id: charter
//! type: project-charter
//! category: planning
//! priority: critical
//! relevance: 95
//! quality: 90
//! dependencies: []
//! ---
//! # Project Charter
//! ```
//!
//! Missing fields fall back to the file stem (id), `other` (type) and the
//! file's modification time.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::{Document, DocumentType, Priority, ProjectId, Result, WeaveError};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    id: Option<String>,
    #[serde(rename = "type")]
    doc_type: Option<DocumentType>,
    category: Option<String>,
    priority: Option<Priority>,
    relevance: Option<f64>,
    quality: Option<f64>,
    last_modified: Option<DateTime<Utc>>,
    dependencies: Vec<String>,
}

/// Split `text` into its front matter (if any) and body
fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };
    match rest.find("\n---") {
        Some(end) => {
            let yaml = &rest[..end];
            let after = &rest[end + 4..];
            let body = after
                .strip_prefix("\r\n")
                .or_else(|| after.strip_prefix('\n'))
                .unwrap_or(after);
            (Some(yaml), body)
        }
        None => (None, text),
    }
}

/// Build a document from markdown text; `fallback_id` is used when the front matter has none
pub fn parse_markdown(
    fallback_id: &str,
    text: &str,
    fallback_modified: DateTime<Utc>,
) -> Result<Document> {
    let (yaml, body) = split_front_matter(text);
    let meta: FrontMatter = match yaml {
        Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str(yaml)?,
        _ => FrontMatter::default(),
    };

    let mut doc = Document::new(
        meta.id.unwrap_or_else(|| fallback_id.to_string()),
        meta.doc_type.unwrap_or_default(),
        body,
    )
    .with_last_modified(meta.last_modified.unwrap_or(fallback_modified))
    .with_dependencies(meta.dependencies);

    if let Some(category) = meta.category {
        doc = doc.with_category(category);
    }
    if let Some(priority) = meta.priority {
        doc = doc.with_priority(priority);
    }
    let relevance = meta.relevance.unwrap_or(doc.relevance_score);
    let quality = meta.quality.unwrap_or(doc.quality_score);
    Ok(doc.with_scores(relevance, quality))
}

fn expand(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let full = if Path::new(pattern).is_absolute() {
            pattern.clone()
        } else {
            root.join(pattern).to_string_lossy().into_owned()
        };
        let paths = glob::glob(&full)
            .map_err(|e| WeaveError::Config(format!("Invalid pattern '{}': {}", pattern, e)))?;
        for entry in paths {
            let path = entry.map_err(|e| WeaveError::Io(e.into_error()))?;
            if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

pub async fn run(ctx: &CommandContext, project: &str, patterns: &[String]) -> Result<()> {
    let output = Output::new();
    let files = expand(&ctx.root, patterns)?;
    if files.is_empty() {
        output.warning("No files matched");
        return Ok(());
    }

    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        let text = fs::read_to_string(path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        match parse_markdown(stem, &text, modified) {
            Ok(doc) => {
                debug!(id = %doc.id, path = %path.display(), "Parsed document");
                documents.push(doc);
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                output.warning(&format!("Skipped {}: {}", path.display(), e));
            }
        }
    }

    let store = ctx.open_store()?;
    let project = ProjectId::new(project);
    let written = store.put_documents(&project, documents).await?;
    let total = store.database().count_documents(&project)?;

    output.success(&format!(
        "Imported {} document(s) into '{}' ({} total)",
        written, project, total
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_parse_with_front_matter() {
        let text = "---\nid: charter\ntype: project-charter\ncategory: planning\npriority: critical\nrelevance: 95\nquality: 120\ndependencies: [scope]\n---\n# Charter\nBody.\n";
        let doc = parse_markdown("file", text, epoch()).unwrap();
        assert_eq!(doc.id, "charter");
        assert_eq!(doc.doc_type, DocumentType::ProjectCharter);
        assert_eq!(doc.category, "planning");
        assert_eq!(doc.priority, Priority::Critical);
        assert_eq!(doc.relevance_score, 95.0);
        assert_eq!(doc.quality_score, 100.0);
        assert_eq!(doc.dependencies, vec!["scope".to_string()]);
        assert_eq!(&*doc.content, "# Charter\nBody.\n");
    }

    #[test]
    fn test_parse_without_front_matter() {
        let doc = parse_markdown("notes", "# Notes\n", epoch()).unwrap();
        assert_eq!(doc.id, "notes");
        assert_eq!(doc.doc_type, DocumentType::Other);
        assert_eq!(doc.last_modified, epoch());
        assert_eq!(&*doc.content, "# Notes\n");
    }

    #[test]
    fn test_bad_front_matter_is_an_error() {
        let text = "---\npriority: urgent\n---\nbody";
        assert!(matches!(
            parse_markdown("x", text, epoch()),
            Err(WeaveError::Yaml(_))
        ));
    }

    #[test]
    fn test_unterminated_front_matter_is_body() {
        let text = "---\nid: x\nno closing fence";
        let doc = parse_markdown("fallback", text, epoch()).unwrap();
        assert_eq!(doc.id, "fallback");
        assert_eq!(&*doc.content, text);
    }

    #[tokio::test]
    async fn test_import_writes_store() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("a.md"), "---\ntype: schedule\n---\n# A\n").unwrap();
        fs::write(docs.join("b.md"), "# B\n").unwrap();
        fs::write(docs.join("skip.txt"), "ignored").unwrap();

        let ctx = CommandContext::load(temp_dir.path(), None).unwrap();
        run(&ctx, "demo", &["docs/*.md".to_string()]).await.unwrap();

        let store = ctx.require_store().unwrap();
        let count = store
            .database()
            .count_documents(&ProjectId::new("demo"))
            .unwrap();
        assert_eq!(count, 2);
    }
}
