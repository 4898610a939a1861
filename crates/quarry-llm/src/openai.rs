use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message, Role};
use crate::retry::{RetryPolicy, send_with_retry};

const RETRY: RetryPolicy = RetryPolicy::new(3);

/// Provider for `OpenAI` and any endpoint speaking the same chat/embeddings API
/// (`DeepSeek`, vLLM, LM Studio, ...).
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: Option<String>,
    temperature: f32,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        api_key: String,
        mut base_url: String,
        model: String,
        embedding_model: Option<String>,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
            embedding_model,
            temperature: 0.0,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

impl OpenAiProvider {
    /// POST `body` to `{base_url}/{endpoint}` and decode a successful JSON reply.
    async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = send_with_retry("openai", RETRY, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;
        if !status.is_success() {
            tracing::error!(endpoint, %status, body = %text, "openai request rejected");
            return Err(LlmError::Other(format!(
                "openai {endpoint} failed (status {status})"
            )));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            temperature: self.temperature,
        };
        let resp: ChatResponse = self.post_json("chat/completions", &body).await?;

        resp.choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse {
                provider: "openai".into(),
            })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let Some(model) = self.embedding_model.as_deref() else {
            return Err(LlmError::EmbedUnsupported {
                provider: "openai".into(),
            });
        };
        let resp: EmbeddingResponse = self
            .post_json("embeddings", &EmbeddingRequest { input: text, model })
            .await?;

        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(LlmError::EmptyResponse {
                provider: "openai".into(),
            })
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            ApiMessage {
                role,
                content: &msg.content,
            }
        })
        .collect()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    temperature: f32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider(base_url: String, embedding_model: Option<String>) -> OpenAiProvider {
        OpenAiProvider::new("key".into(), base_url, "deepseek-chat".into(), embedding_model)
    }

    #[test]
    fn new_trims_trailing_slashes() {
        let p = provider("https://api.example.com/v1//".into(), None);
        assert_eq!(p.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let p = provider("https://api.example.com".into(), None);
        let dbg = format!("{p:?}");
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("\"key\""));
    }

    #[test]
    fn supports_embeddings_follows_model() {
        assert!(!provider("http://x".into(), None).supports_embeddings());
        assert!(provider("http://x".into(), Some("e".into())).supports_embeddings());
    }

    #[tokio::test]
    async fn chat_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
            })))
            .mount(&server)
            .await;

        let p = provider(server.uri(), None);
        let out = p.chat(&[Message::user("hello")]).await.unwrap();
        assert_eq!(out, "hi there");
    }

    #[tokio::test]
    async fn chat_empty_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let p = provider(server.uri(), None);
        let err = p.chat(&[Message::user("hello")]).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn chat_server_error_maps_to_other() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let p = provider(server.uri(), None);
        let err = p.chat(&[Message::user("hello")]).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn embed_returns_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3]}]
            })))
            .mount(&server)
            .await;

        let p = provider(server.uri(), Some("text-embedding-3-small".into()));
        let v = p.embed("text").await.unwrap();
        assert_eq!(v.len(), 3);
    }

    #[tokio::test]
    async fn embed_without_model_returns_error() {
        let p = provider("http://127.0.0.1:1".into(), None);
        let err = p.embed("test").await.unwrap_err();
        assert!(err.to_string().contains("embedding not supported"));
    }

    #[tokio::test]
    async fn chat_unreachable_endpoint_errors() {
        let p = provider("http://127.0.0.1:1".into(), None);
        assert!(p.chat(&[Message::user("test")]).await.is_err());
    }
}
