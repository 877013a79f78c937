//! Client for Ollama's `/api/chat` endpoint.
//!
//! WeChat expects a passive reply within 5 seconds and re-delivers the message
//! if it does not get one, so every call is bounded by a short timeout and
//! there is no retry. Callers turn any [`InferenceError`] into a fallback reply.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SYSTEM_PROMPT: &str = "你是公众号里的智能助理，回答要清晰、简洁、可执行。\
不要输出任何思考过程，不要使用 <think> 标签，直接给出最终答案。";

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request timed out")]
    Timeout,

    #[error("inference backend returned HTTP {0}")]
    HttpStatus(u16),

    #[error("inference request failed: {0}")]
    Network(String),

    #[error("unexpected inference response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::HttpStatus(status.as_u16())
        } else {
            Self::Network(e.to_string())
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<&'a str>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

// ─────────────────────────────────────────────────────────────────────────────

/// Settings for [`OllamaClient`].
#[derive(Debug, Clone)]
pub struct OllamaSettings {
    /// Full chat endpoint, e.g. `http://127.0.0.1:11434/api/chat`.
    pub url: String,
    pub model: String,
    pub timeout: Duration,
    /// Forwarded verbatim as `options` (temperature, num_predict, ...).
    pub options: Option<serde_json::Value>,
    /// Forwarded verbatim as `keep_alive` (e.g. `"30m"`).
    pub keep_alive: Option<String>,
}

#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    settings: OllamaSettings,
}

impl OllamaClient {
    pub fn new(settings: OllamaSettings) -> Result<Self, InferenceError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| InferenceError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Sends `user_text` as a single user turn and returns the model's reply,
    /// trimmed but otherwise untouched (reasoning markup included).
    pub async fn ask(
        &self,
        user_text: &str,
        style_directive: Option<&str>,
    ) -> Result<String, InferenceError> {
        let system = system_prompt(style_directive);
        let request = ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: user_text,
                },
            ],
            stream: false,
            options: self.settings.options.as_ref(),
            keep_alive: self.settings.keep_alive.as_deref(),
        };

        let resp = self
            .http
            .post(&self.settings.url)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(InferenceError::HttpStatus(status.as_u16()));
        }

        let body: ChatResponse = resp.json().await?;
        Ok(body.message.content.trim().to_string())
    }
}

fn system_prompt(style_directive: Option<&str>) -> String {
    match style_directive.map(str::trim).filter(|s| !s.is_empty()) {
        Some(style) => format!("{SYSTEM_PROMPT}\n【风格要求】\n{style}\n"),
        None => SYSTEM_PROMPT.to_string(),
    }
}
