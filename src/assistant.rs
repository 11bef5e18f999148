use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache;
use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::engine::ChatEngine;
use crate::llm::{ parse_llm_type, LlmConfig };
use crate::llm::chat::{ ChatClient, new_client as new_chat_client };
use crate::llm::embedding::{ EmbeddingClient, new_client as new_embedding_client };
use crate::rag::{ load_documents, IndexSettings, LoaderOptions, VectorIndex };
use crate::session::ChatSession;

/// Process-wide state shared by every session: the index, the chat model
/// and the prompts.
pub struct PolicyAssistant {
    index: Arc<VectorIndex>,
    chat_client: Arc<dyn ChatClient>,
    prompt_config: Arc<PromptConfig>,
    memory_token_limit: usize,
}

impl PolicyAssistant {
    fn initialize_llm_clients(
        args: &Args,
        prompt_config: &PromptConfig
    ) -> Result<(Arc<dyn ChatClient>, Arc<dyn EmbeddingClient>), Box<dyn Error + Send + Sync>> {
        let chat_llm_type = parse_llm_type(&args.chat_llm_type)?;
        let chat_api_key = if !args.chat_api_key.trim().is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: chat_llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
            embedding_model: None,
            temperature: args.temperature,
            system_prompt: Some(prompt_config.system_prompt.clone()),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={:?}",
            args.chat_llm_type,
            chat_client.get_model(),
            chat_config.base_url.as_deref().unwrap_or("adapter default")
        );

        let embedding_llm_type = parse_llm_type(&args.embedding_llm_type)?;
        let embedding_config = LlmConfig {
            llm_type: embedding_llm_type,
            base_url: args.embedding_base_url.clone(),
            api_key: args.resolved_embedding_api_key(),
            embedding_model: args.embedding_model.clone(),
            ..LlmConfig::default()
        };
        let embedding_client = new_embedding_client(&embedding_config)?;
        info!(
            "Embedding client configured: Type={}, Model={:?}, BaseURL={:?}",
            args.embedding_llm_type,
            embedding_config.embedding_model.as_deref().unwrap_or("adapter default"),
            embedding_config.base_url.as_deref().unwrap_or("adapter default")
        );

        Ok((chat_client, embedding_client))
    }

    async fn build_index(
        args: &Args,
        embedding_client: Arc<dyn EmbeddingClient>
    ) -> Result<VectorIndex, Box<dyn Error + Send + Sync>> {
        let data_dir = PathBuf::from(&args.data_dir);
        let options = LoaderOptions {
            recursive: args.recursive,
            required_exts: LoaderOptions::parse_exts(args.required_exts.as_deref()),
        };
        info!("Loading and indexing the policy documents from {}", data_dir.display());

        let documents = tokio::task
            ::spawn_blocking(move || load_documents(&data_dir, &options)).await
            .map_err(|e| format!("Document loading task failed: {}", e))??;

        let settings = IndexSettings {
            chunk_size: args.chunk_size,
            chunk_overlap: args.chunk_overlap,
            embed_batch_size: args.embed_batch_size,
            similarity_top_k: args.similarity_top_k.max(1),
        };
        let index = VectorIndex::from_documents(documents, embedding_client, settings).await?;
        Ok(index)
    }

    /// Configures the providers and builds (or reuses) the process-wide index.
    /// Credential and document errors surface here, before anything is served.
    pub async fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let prompt_config = prompt::load_prompts(args.prompts_path.as_deref())?;
        let (chat_client, embedding_client) = Self::initialize_llm_clients(args, &prompt_config)?;

        let index = cache
            ::global()
            .get_or_build(|| Self::build_index(args, embedding_client)).await?;

        Ok(Self::from_parts(index, chat_client, prompt_config, args.memory_token_limit))
    }

    pub fn from_parts(
        index: Arc<VectorIndex>,
        chat_client: Arc<dyn ChatClient>,
        prompt_config: Arc<PromptConfig>,
        memory_token_limit: usize
    ) -> Self {
        Self { index, chat_client, prompt_config, memory_token_limit }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn prompt_config(&self) -> &PromptConfig {
        &self.prompt_config
    }

    /// A fresh session with its own chat engine over the shared index.
    pub fn new_session(&self, id: &str) -> ChatSession {
        let engine = ChatEngine::new(
            Arc::clone(&self.index),
            Arc::clone(&self.chat_client),
            Arc::clone(&self.prompt_config),
            self.memory_token_limit
        );
        info!("Created chat session {}", id);
        ChatSession::new(id, engine, &self.prompt_config.greeting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use crate::testing::{ fixture_index, ScriptedChatClient };
    use clap::Parser;

    #[tokio::test]
    async fn missing_chat_key_fails_before_indexing() {
        let args = Args::parse_from([
            "policy-chat",
            "--chat-api-key=",
            "--data-dir=/definitely/not/here",
        ]);
        let err = PolicyAssistant::new(&args).await.err().expect("startup must fail");
        assert!(err.to_string().contains("API key"), "unexpected error: {}", err);
        assert_eq!(cache::global().build_count(), 0);
    }

    #[tokio::test]
    async fn sessions_share_the_index_but_not_memory() {
        let assistant = PolicyAssistant::from_parts(
            fixture_index().await,
            Arc::new(ScriptedChatClient::new("Twenty days.")),
            Arc::new(PromptConfig::default()),
            3000
        );

        let mut first = assistant.new_session("one");
        let second = assistant.new_session("two");
        first.submit("What is the leave policy?").unwrap();
        first.respond().await.unwrap();

        assert_eq!(first.engine().memory().len(), 2);
        assert!(second.engine().memory().is_empty());
        assert_eq!(second.transcript().entries()[0].role, Role::Assistant);
        assert_eq!(second.transcript().entries()[0].content, assistant.prompt_config().greeting);
    }
}
