pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use futures::{ Future, Stream, StreamExt };
use serde::Deserialize;
use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::ChatMessage;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Lazily produced answer fragments. Finite, and not restartable once drained.
pub type ChatStream = Pin<
    Box<dyn Stream<Item = Result<String, Box<dyn StdError + Send + Sync>>> + Send>
>;

/// A provider's reading of one body line: `None` for lines carrying no text,
/// `Some(Err(_))` when the provider reports an error mid-stream.
pub type ParsedLine = Option<Result<String, Box<dyn StdError + Send + Sync>>>;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage]
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>>;

    /// Providers without native streaming deliver the whole completion as one chunk.
    async fn stream(
        &self,
        messages: &[ChatMessage]
    ) -> Result<ChatStream, Box<dyn StdError + Send + Sync>> {
        let completion = self.complete(messages).await?;
        full_response_as_stream(move || async move { Ok(completion.response) })
    }

    fn get_model(&self) -> String;
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> ChatStream
    where
        F: FnOnce(mpsc::Sender<Result<String, Box<dyn StdError + Send + Sync>>>) -> Fut +
            Send +
            'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn full_response_as_stream<F, Fut>(
    response_fn: F
) -> Result<ChatStream, Box<dyn StdError + Send + Sync>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<String, Box<dyn StdError + Send + Sync>>> + Send + 'static
{
    Ok(
        create_streaming_response(move |tx| async move {
            match response_fn().await {
                Ok(response) => {
                    let _ = tx.send(Ok(response)).await;
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        })
    )
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Hands one parsed line to the consumer. Returns false once the stream must stop.
async fn forward_line(
    tx: &mpsc::Sender<Result<String, Box<dyn StdError + Send + Sync>>>,
    parsed: ParsedLine
) -> bool {
    match parsed {
        Some(Ok(tok)) => tx.send(Ok(tok)).await.is_ok(),
        Some(Err(e)) => {
            let _ = tx.send(Err(e)).await;
            false
        }
        None => true,
    }
}

/// Sends `request` and turns the line-delimited response body into a [`ChatStream`].
///
/// The HTTP status is checked before this returns, so connection and auth
/// failures surface here rather than as the first stream item. Lines may be
/// split across network chunks; they are reassembled before `line_parser`
/// sees them. An error line from the provider ends the stream with that error.
pub async fn http_stream_lines(
    request: reqwest::RequestBuilder,
    line_parser: fn(&str) -> ParsedLine
) -> Result<ChatStream, Box<dyn StdError + Send + Sync>> {
    let resp = request.send().await?.error_for_status()?;

    Ok(
        create_streaming_response(move |tx| async move {
            let mut bytes = resp.bytes_stream();
            let mut pending: Vec<u8> = Vec::new();

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(buf) => {
                        pending.extend_from_slice(&buf);
                        while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                            let line: Vec<u8> = pending.drain(..=pos).collect();
                            let line = String::from_utf8_lossy(&line);
                            if !forward_line(&tx, line_parser(line.trim_end())).await {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(Box::new(e) as _)).await;
                        return;
                    }
                }
            }

            if !pending.is_empty() {
                let line = String::from_utf8_lossy(&pending);
                forward_line(&tx, line_parser(line.trim_end())).await;
            }
        })
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_response_is_a_single_chunk() {
        let stream = full_response_as_stream(|| async { Ok("whole answer".to_string()) }).unwrap();
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), "whole answer");
    }

    #[tokio::test]
    async fn failed_response_is_forwarded_as_stream_error() {
        let stream = full_response_as_stream(|| async { Err("provider down".into()) }).unwrap();
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap_err().to_string(), "provider down");
    }

    #[test]
    fn openai_factory_rejects_missing_key() {
        let config = LlmConfig { api_key: None, ..LlmConfig::default() };
        let err = new_client(&config).err().expect("missing key must fail");
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn ollama_factory_needs_no_key() {
        let config = LlmConfig { llm_type: LlmType::Ollama, ..LlmConfig::default() };
        let client = new_client(&config).unwrap();
        assert_eq!(client.get_model(), ollama::DEFAULT_OLLAMA_CHAT_MODEL);
    }
}
