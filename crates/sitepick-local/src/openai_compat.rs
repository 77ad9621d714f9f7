use crate::{env, env_any};
use serde::{Deserialize, Serialize};
use sitepick_core::{ChatBackend, Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
const DEFAULT_MAX_TOKENS: u64 = 300;

fn openai_compat_base_url_from_env() -> Option<String> {
    env("SITEPICK_OPENAI_COMPAT_BASE_URL")
}

fn openai_compat_api_key_from_env() -> Option<String> {
    env_any(&["SITEPICK_OPENAI_COMPAT_API_KEY", "GROQ_API_KEY"])
}

fn openai_compat_model_from_env() -> Option<String> {
    env("SITEPICK_OPENAI_COMPAT_MODEL")
}

/// Chat client for any `/chat/completions` endpoint. The base URL includes
/// the version prefix (`.../v1`).
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    /// Groq is the default endpoint and needs a key; a custom base URL (a
    /// local server, say) may run without one.
    pub fn from_env(client: reqwest::Client, model_override: Option<String>) -> Result<Self> {
        let custom_base = openai_compat_base_url_from_env();
        let api_key = openai_compat_api_key_from_env();
        if custom_base.is_none() && api_key.is_none() {
            return Err(Error::NotConfigured(
                "missing SITEPICK_OPENAI_COMPAT_API_KEY (or GROQ_API_KEY)".to_string(),
            ));
        }
        let model = model_override
            .or_else(openai_compat_model_from_env)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self::new(
            client,
            custom_base.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model,
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_chat_completions(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub async fn chat_with(
        &self,
        system: &str,
        user: &str,
        timeout_ms: u64,
        max_tokens: Option<u64>,
        temperature: Option<f64>,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !system.trim().is_empty() {
            messages.push(Message {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: user.to_string(),
        });
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages,
            max_tokens,
            temperature,
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("openai_compat chat after {timeout_ms}ms"))
                } else {
                    Error::Llm(e.to_string())
                }
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!(
                "openai_compat chat.completions HTTP {status}"
            )));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Llm("openai_compat reply had no choices".to_string()))
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenAiCompatClient {
    fn name(&self) -> &'static str {
        "openai_compat"
    }

    async fn chat(&self, system: &str, user: &str, timeout_ms: u64) -> Result<String> {
        self.chat_with(system, user, timeout_ms, Some(DEFAULT_MAX_TOKENS), Some(0.0))
            .await
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}
