//! Chat-completion client for Groq's OpenAI-compatible API.

use std::time::Duration;

use async_trait::async_trait;
use lexcase_core::ChatTurn;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RagError, check_status};

pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "mixtral-8x7b-32768";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat-completion prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ChatTurn> for PromptMessage {
    fn from(turn: &ChatTurn) -> Self {
        match turn {
            ChatTurn::Human(c) => Self::user(c.clone()),
            ChatTurn::Ai(c) => Self::assistant(c.clone()),
        }
    }
}

/// A hosted chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, RagError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct GroqClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GroqClient {
    pub fn new(api_key: String, model: String) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_GROQ_BASE_URL.to_string(),
            api_key,
            model,
            temperature: 0.1,
        })
    }

    /// Point at a different OpenAI-compatible endpoint (no trailing slash needed).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, RagError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        debug!(url = %url, model = %self.model, messages = messages.len(), "requesting completion");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let resp = check_status("groq", resp).await?;

        let parsed: CompletionResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(RagError::EmptyCompletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    #[test]
    fn turn_roles_map_to_prompt_roles() {
        assert_eq!(
            PromptMessage::from(&ChatTurn::Human("q".into())),
            PromptMessage::user("q")
        );
        assert_eq!(
            PromptMessage::from(&ChatTurn::Ai("a".into())),
            PromptMessage::assistant("a")
        );
    }

    #[test]
    fn prompt_message_wire_format() {
        let json = serde_json::to_value(PromptMessage::system("be precise")).unwrap();
        assert_eq!(json, json!({"role": "system", "content": "be precise"}));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = GroqClient::new("k".into(), DEFAULT_GROQ_MODEL.into())
            .unwrap()
            .with_base_url("http://localhost:9000/v1/");
        assert_eq!(client.base_url, "http://localhost:9000/v1");
    }

    #[tokio::test]
    async fn complete_sends_model_and_messages() {
        let router = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer test-key");
                assert_eq!(body["model"], "mixtral-8x7b-32768");
                assert_eq!(body["messages"][1]["role"], "user");
                let temperature = body["temperature"].as_f64().unwrap();
                assert!((temperature - 0.1).abs() < 1e-6);
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "  Executive Summary: ...  "}}]
                }))
            }),
        );
        let base = serve(router).await;

        let client = GroqClient::new("test-key".into(), DEFAULT_GROQ_MODEL.into())
            .unwrap()
            .with_base_url(base);
        let answer = client
            .complete(&[PromptMessage::system("sys"), PromptMessage::user("What is novation?")])
            .await
            .unwrap();
        assert_eq!(answer, "Executive Summary: ...");
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "invalid api key") }),
        );
        let base = serve(router).await;

        let client = GroqClient::new("bad".into(), DEFAULT_GROQ_MODEL.into())
            .unwrap()
            .with_base_url(base);
        let err = client.complete(&[PromptMessage::user("hi")]).await.unwrap_err();
        match err {
            RagError::Server { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_empty_completion() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let base = serve(router).await;

        let client = GroqClient::new("k".into(), DEFAULT_GROQ_MODEL.into())
            .unwrap()
            .with_base_url(base);
        let err = client.complete(&[PromptMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyCompletion));
    }
}
