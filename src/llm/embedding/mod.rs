pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;

use super::{ LlmConfig, LlmType };
use self::ollama::OllamaEmbeddingClient;
use self::openai::OpenAIEmbeddingClient;

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embeds `texts` in order; the result has exactly one vector per input.
    async fn embed_batch(
        &self,
        texts: &[String]
    ) -> Result<Vec<Vec<f32>>, Box<dyn StdError + Send + Sync>>;

    async fn embed(&self, text: &str) -> Result<EmbeddingResponse, Box<dyn StdError + Send + Sync>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| "Embedding generation returned no results".to_string())?;
        Ok(EmbeddingResponse { embedding })
    }
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn EmbeddingClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn EmbeddingClient> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIEmbeddingClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaEmbeddingClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

pub(crate) fn check_batch_len(
    provider: &str,
    expected: usize,
    embeddings: &[Vec<f32>]
) -> Result<(), Box<dyn StdError + Send + Sync>> {
    if embeddings.len() != expected {
        return Err(
            format!(
                "{} embedding returned {} vectors for {} inputs",
                provider,
                embeddings.len(),
                expected
            ).into()
        );
    }
    Ok(())
}
