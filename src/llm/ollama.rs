use crate::llm::client::LLMClient;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Client for a local Ollama server (`/api/chat`, non-streaming)
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessageRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    async fn send_chat_messages(&self, messages: Vec<ChatMessage<'_>>) -> Result<String> {
        let request = ChatMessageRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(AppError::RateLimited(format!(
                "Ollama is busy serving {}",
                self.model
            ))),
            status if !status.is_success() => Err(AppError::Upstream(format!(
                "Ollama error ({})",
                status
            ))),
            _ => {
                let body: ChatMessageResponse = response
                    .json()
                    .await
                    .map_err(|e| AppError::MalformedResponse(format!("Ollama response: {}", e)))?;
                Ok(body.message.content)
            }
        }
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.send_chat_messages(vec![ChatMessage {
            role: "user",
            content: prompt,
        }])
        .await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.send_chat_messages(vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ])
        .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
