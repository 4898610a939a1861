use std::fmt;

use quarry_memory::{BoxFuture, Document};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A query as received from callers: either a bare string or an object carrying the text
/// under `question` or `input`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryInput {
    Text(String),
    Question { question: String },
    Input { input: String },
}

impl QueryInput {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Question { question } => question,
            Self::Input { input } => input,
        }
    }

    /// Parse a JSON query object, treating anything that is not valid JSON as plain text.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        if (trimmed.starts_with('{') || trimmed.starts_with('"'))
            && let Ok(parsed) = serde_json::from_str(trimmed)
        {
            return parsed;
        }
        Self::Text(raw.to_owned())
    }
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl fmt::Display for QueryInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrieval back-end: returns up to `k` documents for a query, most relevant first.
///
/// Implementations are free to score however they like; only the order of the returned list
/// is consumed downstream.
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    fn search<'a>(&'a self, query: &'a str, k: usize) -> BoxFuture<'a, Result<Vec<Document>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_all_shapes() {
        let text: QueryInput = serde_json::from_str(r#""what is rust""#).unwrap();
        let question: QueryInput = serde_json::from_str(r#"{"question": "q1"}"#).unwrap();
        let input: QueryInput = serde_json::from_str(r#"{"input": "i1"}"#).unwrap();
        assert_eq!(text, QueryInput::Text("what is rust".into()));
        assert_eq!(question.as_str(), "q1");
        assert_eq!(input.as_str(), "i1");
    }

    #[test]
    fn unknown_object_shape_rejected() {
        assert!(serde_json::from_str::<QueryInput>(r#"{"query": "x"}"#).is_err());
    }

    #[test]
    fn parse_falls_back_to_text() {
        assert_eq!(QueryInput::parse(r#"{"question": "q"}"#).as_str(), "q");
        assert_eq!(QueryInput::parse("{not json").as_str(), "{not json");
        assert_eq!(QueryInput::parse("plain words").as_str(), "plain words");
        assert_eq!(QueryInput::parse(r#"{"query": "x"}"#).as_str(), r#"{"query": "x"}"#);
    }

    #[test]
    fn display_and_from() {
        let q: QueryInput = "hello".into();
        assert_eq!(q.to_string(), "hello");
        let q: QueryInput = String::from("owned").into();
        assert_eq!(q.as_str(), "owned");
    }
}
