use crate::{env, env_bool};
use serde::{Deserialize, Serialize};
use sitepick_core::{ChatBackend, Error, Result};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_MODEL: &str = "qwen2.5:3b-instruct";

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Opt-in via `SITEPICK_OLLAMA_ENABLE`; never talks to localhost unasked.
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        if !env_bool("SITEPICK_OLLAMA_ENABLE") {
            return Err(Error::NotConfigured(
                "SITEPICK_OLLAMA_ENABLE is not set (or false)".to_string(),
            ));
        }
        let base_url = env("SITEPICK_OLLAMA_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = env("SITEPICK_OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self::new(client, base_url, model))
    }

    fn endpoint_chat(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl ChatBackend for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn chat(&self, system: &str, user: &str, timeout_ms: u64) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !system.trim().is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user.to_string(),
        });
        let req = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: Some(false),
            options: Some(ChatOptions { temperature: 0.0 }),
        };

        let resp = self
            .client
            .post(self.endpoint_chat())
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("ollama chat after {timeout_ms}ms"))
                } else {
                    Error::Llm(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("ollama chat HTTP {status}")));
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        Ok(parsed.message.content)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, EnvGuard};
    use axum::{routing::post, Json, Router};

    #[test]
    fn disabled_unless_opted_in() {
        let _g = EnvGuard::set("SITEPICK_OLLAMA_ENABLE", "0");
        assert!(matches!(
            OllamaClient::from_env(reqwest::Client::new()),
            Err(Error::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn chat_reads_message_content() {
        let app = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["stream"], false);
                assert_eq!(body["messages"][0]["role"], "system");
                Json(serde_json::json!({
                    "message": {"role": "assistant", "content": "1. POST"}
                }))
            }),
        );
        let base = serve(app).await;
        let c = OllamaClient::new(reqwest::Client::new(), base, "m");
        let out = c.chat("be terse", "classify", 5_000).await.unwrap();
        assert_eq!(out, "1. POST");
    }
}
