use async_trait::async_trait;
use std::error::Error as StdError;
use super::{ check_batch_len, EmbeddingClient };
use super::super::LlmConfig;
use crate::llm::chat::ollama::DEFAULT_OLLAMA_BASE_URL;
use rllm::{ builder::{ LLMBackend, LLMBuilder }, LLMProvider };

pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";

pub struct OllamaEmbeddingClient {
    llm: Box<dyn LLMProvider + Send + Sync>,
}

impl OllamaEmbeddingClient {
    pub fn new(
        base_url: Option<String>,
        model: Option<String>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let url = base_url.unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());
        let embed_model = model.unwrap_or_else(|| DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string());

        let builder = LLMBuilder::new()
            .backend(LLMBackend::Ollama)
            .base_url(url)
            .model(embed_model)
            .stream(false);

        let llm_provider = builder.build()?;

        Ok(Self {
            llm: llm_provider,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Self::new(config.base_url.clone(), config.embedding_model.clone())
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn embed_batch(
        &self,
        texts: &[String]
    ) -> Result<Vec<Vec<f32>>, Box<dyn StdError + Send + Sync>> {
        let embeddings = self.llm.embed(texts.to_vec()).await?;
        check_batch_len("Ollama", texts.len(), &embeddings)?;
        Ok(embeddings)
    }
}
