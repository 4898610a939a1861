pub mod error;
pub mod loader;
pub mod splitter;
pub mod types;

pub use error::DocumentError;
pub use loader::{DocumentLoader, TextLoader};
pub use splitter::{Splitter, SplitterConfig, TextSplitter};
pub use types::{Document, Metadata};

/// Files above this size are refused by [`TextLoader`] (16 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;
