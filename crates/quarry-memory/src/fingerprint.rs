//! Content-derived document identity.

use std::fmt;

use crate::document::Document;

/// blake3 digest of a document's content, optionally extended with selected metadata.
///
/// Used as the deduplication key across retrievers that never agree on document ids. The
/// ordering implementation exists for map keys only and carries no ranking meaning.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    #[must_use]
    pub fn of_content(content: &str) -> Self {
        Self(*blake3::hash(content.as_bytes()).as_bytes())
    }

    /// Hash content together with the metadata values under `keys`.
    ///
    /// With an empty `keys` slice this equals [`Fingerprint::of_content`]. Missing keys are
    /// skipped.
    #[must_use]
    pub fn of_document(document: &Document, keys: &[&str]) -> Self {
        if keys.is_empty() {
            return Self::of_content(&document.content);
        }
        let mut hasher = blake3::Hasher::new();
        hasher.update(document.content.as_bytes());
        for key in keys {
            if let Some(value) = document.metadata.get(*key) {
                hasher.update(b"\0");
                hasher.update(key.as_bytes());
                hasher.update(b"=");
                hasher.update(value.to_string().as_bytes());
            }
        }
        Self(*hasher.finalize().as_bytes())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }

    /// First 12 hex characters, for logs and display.
    #[must_use]
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}
