//! Query expansion: one query in, a few rephrasings out.

use std::sync::Arc;
use std::time::Duration;

use quarry_llm::LlmProvider;

const EXPANSION_PROMPT: &str = "You help a search engine find documents. Rewrite the user \
question below into {n} different search queries that look at it from different angles, so \
that documents phrased differently from the question are still found. Write exactly one query \
per line. Do not number the lines and do not add any other text.

Question: {query}";

/// Build the instruction sent to the generator.
#[must_use]
pub fn expansion_prompt(query: &str, n: usize) -> String {
    EXPANSION_PROMPT
        .replace("{n}", &n.to_string())
        .replace("{query}", query)
}

/// Drop a `<think>` block some models put before the answer.
fn strip_reasoning(response: &str) -> &str {
    match response.rfind("</think>") {
        Some(end) => &response[end + "</think>".len()..],
        None => response,
    }
}

fn clean_line(line: &str) -> &str {
    let mut s = line.trim();
    if let Some(rest) = s.strip_prefix(['-', '*', '•']) {
        s = rest.trim_start();
    } else {
        let digits = s.len() - s.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 && s[digits..].starts_with(['.', ')']) {
            s = s[digits + 1..].trim_start();
        }
    }
    s.trim_matches('"').trim()
}

/// Parse a generator response into at most `n` queries with `query` first.
///
/// Blank lines, list markers and repeats (including of the original query) are dropped.
#[must_use]
pub fn parse_variants(query: &str, response: &str, n: usize) -> Vec<String> {
    let mut variants = vec![query.to_owned()];
    for line in strip_reasoning(response).lines() {
        if variants.len() >= n {
            break;
        }
        let candidate = clean_line(line);
        if candidate.is_empty() || variants.iter().any(|v| v == candidate) {
            continue;
        }
        variants.push(candidate.to_owned());
    }
    variants
}

/// Generates query variants; never fails, degrading to the original query alone.
pub struct QueryExpander<P: LlmProvider> {
    provider: Arc<P>,
    timeout: Duration,
}

impl<P: LlmProvider> std::fmt::Debug for QueryExpander<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExpander")
            .field("provider", &self.provider.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<P: LlmProvider> QueryExpander<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Up to `n` queries, the original always first. `n` below one is treated as one.
    pub async fn expand(&self, query: &str, n: usize) -> Vec<String> {
        let n = n.max(1);
        if n == 1 || query.trim().is_empty() {
            return vec![query.to_owned()];
        }

        let prompt = expansion_prompt(query, n);
        match tokio::time::timeout(self.timeout, self.provider.generate(&prompt)).await {
            Ok(Ok(response)) => {
                let variants = parse_variants(query, &response, n);
                tracing::debug!(count = variants.len(), "expanded query");
                variants
            }
            Ok(Err(e)) => {
                tracing::warn!(provider = self.provider.name(), "query expansion failed: {e}");
                vec![query.to_owned()]
            }
            Err(_) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "query expansion timed out"
                );
                vec![query.to_owned()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use quarry_llm::mock::MockProvider;

    use super::*;

    fn expander(provider: MockProvider) -> QueryExpander<MockProvider> {
        QueryExpander::new(Arc::new(provider))
    }

    #[test]
    fn prompt_mentions_count_and_query() {
        let p = expansion_prompt("what is BM25", 4);
        assert!(p.contains("into 4 different"));
        assert!(p.ends_with("Question: what is BM25"));
    }

    #[test]
    fn parse_strips_markers_and_blank_lines() {
        let response = "1. first variant\n\n- second variant\n* third\n2) fourth\n\"fifth\"";
        let variants = parse_variants("orig", response, 10);
        assert_eq!(
            variants,
            vec!["orig", "first variant", "second variant", "third", "fourth", "fifth"]
        );
    }

    #[test]
    fn parse_drops_repeats_of_original() {
        let variants = parse_variants("orig", "orig\nother\nother\n", 5);
        assert_eq!(variants, vec!["orig", "other"]);
    }

    #[test]
    fn parse_truncates_to_n() {
        let variants = parse_variants("q", "a\nb\nc\nd", 3);
        assert_eq!(variants, vec!["q", "a", "b"]);
    }

    #[test]
    fn parse_keeps_leading_numbers_that_are_not_markers() {
        let variants = parse_variants("q", "2024 sales figures", 3);
        assert_eq!(variants, vec!["q", "2024 sales figures"]);
    }

    #[test]
    fn parse_skips_reasoning_block() {
        let variants = parse_variants("q", "<think>\nhmm\nlet me see\n</think>\nreal one", 5);
        assert_eq!(variants, vec!["q", "real one"]);
    }

    #[tokio::test]
    async fn expand_puts_original_first() {
        let e = expander(MockProvider::with_responses(vec![
            "rust memory model\nownership rules".into(),
        ]));
        let variants = e.expand("how does rust manage memory", 3).await;
        assert_eq!(
            variants,
            vec!["how does rust manage memory", "rust memory model", "ownership rules"]
        );
    }

    #[tokio::test]
    async fn generator_failure_degrades_to_identity() {
        let e = expander(MockProvider::failing());
        assert_eq!(e.expand("q", 5).await, vec!["q"]);
    }

    #[tokio::test(start_paused = true)]
    async fn generator_timeout_degrades_to_identity() {
        let e = expander(MockProvider::default().with_delay(60_000))
            .with_timeout(Duration::from_secs(1));
        assert_eq!(e.expand("q", 5).await, vec!["q"]);
    }

    #[tokio::test]
    async fn n_of_one_or_zero_skips_generator() {
        let provider = MockProvider::default();
        let e = expander(provider.clone());
        assert_eq!(e.expand("q", 0).await, vec!["q"]);
        assert_eq!(e.expand("q", 1).await, vec!["q"]);
        assert!(provider.recorded_prompts().is_empty());
    }

    #[tokio::test]
    async fn empty_query_is_returned_as_is() {
        let e = expander(MockProvider::default());
        assert_eq!(e.expand("", 4).await, vec![""]);
    }

    mod proptest_expander {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn original_first_and_bounded(
                query in "[a-z]{1,20}( [a-z]{1,10}){0,3}",
                response in "([a-z0-9 .\\-*]{0,30}\n){0,12}",
                n in 0usize..8,
            ) {
                let variants = parse_variants(&query, &response, n.max(1));
                prop_assert_eq!(&variants[0], &query);
                prop_assert!(variants.len() <= n.max(1));
                let unique: std::collections::HashSet<_> = variants.iter().collect();
                prop_assert_eq!(unique.len(), variants.len());
            }
        }
    }
}
