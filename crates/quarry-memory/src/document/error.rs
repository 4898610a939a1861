use std::path::PathBuf;

/// Failure to turn a file on disk into a [`super::Document`].
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("{} is not a text or markdown file", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("{} is {size} bytes, limit is {limit}", path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("{} has no text to index", path.display())]
    Empty { path: PathBuf },
}
