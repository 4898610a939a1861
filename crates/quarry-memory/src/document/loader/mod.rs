mod text;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

pub use text::TextLoader;

use super::{Document, DocumentError};

pub type LoadFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Document>, DocumentError>> + Send + 'a>>;

/// Reads one file into zero or more documents.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> LoadFuture<'_>;

    /// Lowercase extensions without the leading dot.
    fn supported_extensions(&self) -> &[&str];

    fn accepts(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        ext.is_empty() || self.supported_extensions().contains(&ext.as_str())
    }
}
