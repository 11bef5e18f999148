use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use std::error::Error as StdError;
use super::{ http_stream_lines, ChatClient, ChatStream, CompletionResponse, ParsedLine };
use crate::llm::LlmConfig;
use crate::models::chat::{ ChatMessage, Role };
use log::debug;

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_CHAT_MODEL: &str = "llama3";

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
    temperature: f32,
    system_prompt: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct StreamResponse {
    message: Option<OllamaMessage>,
    error: Option<String>,
}

impl OllamaClient {
    pub fn new(
        base_url: Option<String>,
        completion_model: Option<String>,
        temperature: f32,
        system_prompt: Option<String>
    ) -> Self {
        let model = completion_model.unwrap_or_else(|| DEFAULT_OLLAMA_CHAT_MODEL.to_string());
        let url = base_url.unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.into());

        Self {
            http: HttpClient::new(),
            base_url: url,
            completion_model: model,
            temperature,
            system_prompt,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        if config.llm_type != crate::llm::LlmType::Ollama {
            return Err("Invalid config type for OllamaClient".into());
        }

        Ok(
            Self::new(
                config.base_url.clone(),
                config.completion_model.clone(),
                config.temperature,
                config.system_prompt.clone()
            )
        )
    }

    fn build_request(&self, messages: &[ChatMessage], stream: bool) -> ChatRequest {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = &self.system_prompt {
            if messages.first().map(|m| m.role) != Some(Role::System) {
                wire.push(OllamaMessage { role: "system".into(), content: system.clone() });
            }
        }
        wire.extend(
            messages.iter().map(|m| OllamaMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
        );

        ChatRequest {
            model: self.completion_model.clone(),
            messages: wire,
            stream,
            options: OllamaOptions { temperature: self.temperature },
        }
    }
}

/// One NDJSON line of a streaming `/api/chat` response.
fn parse_ndjson_line(line: &str) -> ParsedLine {
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<StreamResponse>(line) {
        Ok(StreamResponse { error: Some(error), .. }) => {
            Some(Err(format!("Ollama stream error: {}", error).into()))
        }
        Ok(chunk) => {
            chunk.message
                .map(|m| m.content)
                .filter(|c| !c.is_empty())
                .map(Ok)
        }
        Err(e) => {
            debug!("Ollama stream parse error: {} for line: {}", e, line);
            None
        }
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(
        &self,
        messages: &[ChatMessage]
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let req = self.build_request(messages, false);
        let resp = self.http.post(&url).json(&req).send().await?.error_for_status()?;
        let data = resp.json::<ChatResponse>().await?;
        Ok(CompletionResponse { response: data.message.content })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage]
    ) -> Result<ChatStream, Box<dyn StdError + Send + Sync>> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let req = self.build_request(messages, true);
        http_stream_lines(self.http.post(&url).json(&req), parse_ndjson_line).await
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }
}
