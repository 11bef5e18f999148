mod response;

pub use response::StreamingChatResponse;

use log::{ debug, info, warn };
use std::sync::Arc;
use thiserror::Error;

use crate::config::prompt::{ get_condense_prompt, get_text_qa_prompt, PromptConfig };
use crate::history::{ format_history_for_prompt, ChatMemory };
use crate::llm::chat::ChatClient;
use crate::models::chat::ChatMessage;
use crate::rag::index::format_documents_for_prompt;
use crate::rag::VectorIndex;

#[derive(Debug, Error)]
pub enum ChatEngineError {
    #[error("failed to condense the question: {0}")]
    Condense(String),
    #[error("failed to retrieve passages: {0}")]
    Retrieval(String),
    #[error("failed to start the answer stream: {0}")]
    Completion(String),
    #[error("the answer stream has not been fully consumed")]
    Incomplete,
    #[error("the answer stream failed: {0}")]
    Failed(String),
}

/// Conversational front end over the shared index ("condense question" mode).
///
/// Follow-up messages are rewritten into standalone questions using the
/// engine's own memory before retrieval, so one engine belongs to one
/// conversation.
pub struct ChatEngine {
    index: Arc<VectorIndex>,
    llm: Arc<dyn ChatClient>,
    prompts: Arc<PromptConfig>,
    memory: ChatMemory,
    similarity_top_k: usize,
}

impl ChatEngine {
    pub fn new(
        index: Arc<VectorIndex>,
        llm: Arc<dyn ChatClient>,
        prompts: Arc<PromptConfig>,
        memory_token_limit: usize
    ) -> Self {
        let similarity_top_k = index.settings().similarity_top_k;
        Self {
            index,
            llm,
            prompts,
            memory: ChatMemory::new(memory_token_limit),
            similarity_top_k,
        }
    }

    pub fn memory(&self) -> &ChatMemory {
        &self.memory
    }

    pub fn prompts(&self) -> &PromptConfig {
        &self.prompts
    }

    /// Rewrites `message` into a question that stands on its own.
    /// Without prior turns the message is returned unchanged and no LLM call is made.
    pub async fn condense_question(&self, message: &str) -> Result<String, ChatEngineError> {
        let history = self.memory.window();
        if history.is_empty() {
            return Ok(message.to_string());
        }

        let prompt = get_condense_prompt(&self.prompts, &format_history_for_prompt(history), message);
        let completion = self.llm
            .complete(&[ChatMessage::user(prompt)]).await
            .map_err(|e| ChatEngineError::Condense(e.to_string()))?;

        let condensed = completion.response.trim();
        if condensed.is_empty() {
            warn!("LLM returned an empty standalone question; using the message as-is");
            return Ok(message.to_string());
        }
        info!("Querying with: {}", condensed);
        Ok(condensed.to_string())
    }

    /// Starts answering `message`. The returned response must be drained and
    /// passed to [`ChatEngine::record_turn`] for the turn to be remembered.
    pub async fn stream_chat(&self, message: &str) -> Result<StreamingChatResponse, ChatEngineError> {
        let query = self.condense_question(message).await?;

        let sources = self.index
            .retrieve(&query, self.similarity_top_k).await
            .map_err(|e| ChatEngineError::Retrieval(e.to_string()))?;
        for hit in &sources {
            debug!("Retrieved {} (score {:.4})", hit.node.id, hit.score);
        }

        let context = format_documents_for_prompt(&sources);
        let messages = vec![
            ChatMessage::system(self.prompts.system_prompt.clone()),
            ChatMessage::user(get_text_qa_prompt(&self.prompts, &context, &query))
        ];

        let stream = self.llm
            .stream(&messages).await
            .map_err(|e| ChatEngineError::Completion(e.to_string()))?;

        Ok(StreamingChatResponse::new(message.to_string(), query, sources, stream))
    }

    /// Answers `message` in one call and records the turn.
    pub async fn chat(&mut self, message: &str) -> Result<String, ChatEngineError> {
        let mut response = self.stream_chat(message).await?;
        let answer = response.collect_response().await?;
        self.record_turn(&response)?;
        Ok(answer)
    }

    /// Appends the user message and the full answer to memory.
    pub fn record_turn(&mut self, response: &StreamingChatResponse) -> Result<(), ChatEngineError> {
        if let Some(e) = response.error() {
            return Err(ChatEngineError::Failed(e.to_string()));
        }
        if !response.is_done() {
            return Err(ChatEngineError::Incomplete);
        }
        self.memory.put(ChatMessage::user(response.user_message()));
        self.memory.put(ChatMessage::assistant(response.response()));
        Ok(())
    }

    pub fn reset(&mut self) {
        self.memory.reset();
    }
}
