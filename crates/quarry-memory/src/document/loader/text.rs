use std::path::Path;

use super::{DocumentLoader, LoadFuture};
use crate::document::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError};

/// Loads plain text and markdown files as a single document each.
///
/// The canonical path is stored under `source`, and `content_type` records
/// whether the file was treated as markdown.
#[derive(Debug, Clone)]
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown") => {
            "text/markdown"
        }
        _ => "text/plain",
    }
}

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> LoadFuture<'_> {
        let path = path.to_path_buf();
        Box::pin(async move {
            if !self.accepts(&path) {
                return Err(DocumentError::UnsupportedFormat { path });
            }
            let path = tokio::fs::canonicalize(&path).await?;

            let size = tokio::fs::metadata(&path).await?.len();
            if size > self.max_file_size {
                return Err(DocumentError::FileTooLarge {
                    path,
                    size,
                    limit: self.max_file_size,
                });
            }

            let content = tokio::fs::read_to_string(&path).await?;
            if content.trim().is_empty() {
                return Err(DocumentError::Empty { path });
            }
            tracing::debug!(path = %path.display(), bytes = size, "loaded file");

            let kind = content_type(&path);
            Ok(vec![
                Document::new(content)
                    .with_metadata("source", path.display().to_string())
                    .with_metadata("content_type", kind),
            ])
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "text", "md", "markdown"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn plain_text_becomes_one_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = file(&dir, "notes.txt", b"ownership moves values");

        let docs = TextLoader::default().load(&path).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "ownership moves values");
        assert_eq!(docs[0].meta_str("content_type"), Some("text/plain"));
        assert!(docs[0].source().unwrap().ends_with("notes.txt"));
    }

    #[tokio::test]
    async fn markdown_extension_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = file(&dir, "GUIDE.MD", b"# Title\n\nBody");

        let docs = TextLoader::default().load(&path).await.unwrap();
        assert_eq!(docs[0].meta_str("content_type"), Some("text/markdown"));
    }

    #[tokio::test]
    async fn oversized_file_reports_size_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = file(&dir, "big.txt", b"0123456789");

        let err = TextLoader { max_file_size: 4 }.load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            DocumentError::FileTooLarge { size: 10, limit: 4, .. }
        ));
    }

    #[tokio::test]
    async fn unsupported_extension_is_refused_before_reading() {
        let err = TextLoader::default()
            .load(Path::new("/no/such/image.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("image.png"));
    }

    #[tokio::test]
    async fn whitespace_only_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = file(&dir, "blank.md", b"  \n\t\n");

        let err = TextLoader::default().load(&path).await.unwrap_err();
        assert!(matches!(err, DocumentError::Empty { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = TextLoader::default()
            .load(Path::new("/definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Io(_)));
    }

    #[test]
    fn extensionless_files_are_accepted() {
        let loader = TextLoader::default();
        assert!(loader.accepts(Path::new("README")));
        assert!(loader.accepts(Path::new("a.Markdown")));
        assert!(!loader.accepts(Path::new("a.pdf")));
    }
}
