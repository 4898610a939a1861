use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// Free-form document metadata. Ordered so that serialization and hashing are stable.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A unit of text flowing through retrieval.
///
/// Documents carry no assigned identity; use [`Document::fingerprint`] when one is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// String-valued metadata entry.
    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.meta_str("source")
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_content(&self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_metadata() {
        let doc = Document::new("body")
            .with_metadata("source", "a.txt")
            .with_metadata("page", 3);
        assert_eq!(doc.source(), Some("a.txt"));
        assert_eq!(doc.metadata.get("page"), Some(&serde_json::json!(3)));
        assert_eq!(doc.meta_str("page"), None);
    }

    #[test]
    fn fingerprint_ignores_metadata() {
        let a = Document::new("same").with_metadata("source", "a");
        let b = Document::new("same").with_metadata("source", "b");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn deserializes_without_metadata() {
        let doc: Document = serde_json::from_str(r#"{"content": "x"}"#).unwrap();
        assert!(doc.metadata.is_empty());
    }
}
