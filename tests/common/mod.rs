#![allow(dead_code)]

use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;

use policy_chat::assistant::PolicyAssistant;
use policy_chat::config::prompt::PromptConfig;
use policy_chat::llm::chat::{ ChatClient, ChatStream, CompletionResponse };
use policy_chat::llm::embedding::EmbeddingClient;
use policy_chat::models::chat::ChatMessage;
use policy_chat::rag::{ Document, IndexSettings, VectorIndex };
use policy_chat::server::AppState;

pub const ANSWER: &str = "Every employee receives twenty days of paid annual leave.";

/// Bag-of-words vectors so retrieval is deterministic without a provider.
pub struct WordHashEmbedder;

#[async_trait]
impl EmbeddingClient for WordHashEmbedder {
    async fn embed_batch(
        &self,
        texts: &[String]
    ) -> Result<Vec<Vec<f32>>, Box<dyn Error + Send + Sync>> {
        Ok(
            texts
                .iter()
                .map(|text| {
                    let mut vector = vec![0.0; 64];
                    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
                        let hash = word
                            .to_lowercase()
                            .bytes()
                            .fold(5381u32, |h, b| h.wrapping_mul(33) ^ (b as u32));
                        vector[(hash as usize) % 64] += 1.0;
                    }
                    vector
                })
                .collect()
        )
    }
}

/// Streams a fixed answer word by word.
pub struct CannedChatClient;

#[async_trait]
impl ChatClient for CannedChatClient {
    async fn complete(
        &self,
        _messages: &[ChatMessage]
    ) -> Result<CompletionResponse, Box<dyn Error + Send + Sync>> {
        Ok(CompletionResponse { response: "What is the leave carry-over policy?".to_string() })
    }

    async fn stream(
        &self,
        _messages: &[ChatMessage]
    ) -> Result<ChatStream, Box<dyn Error + Send + Sync>> {
        let chunks: Vec<Result<String, Box<dyn Error + Send + Sync>>> = ANSWER.split_inclusive(' ')
            .map(|c| Ok(c.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    fn get_model(&self) -> String {
        "canned".to_string()
    }
}

fn document(id: &str, text: &str) -> Document {
    Document { id: id.to_string(), source: id.to_string(), text: text.to_string() }
}

pub async fn assistant() -> Arc<PolicyAssistant> {
    let documents = vec![
        document("leave.md", "Leave policy: every employee receives twenty days of paid annual leave."),
        document("remote.md", "Remote work is allowed two days per week with manager approval."),
        document("expenses.md", "Expense claims must be filed within thirty days with receipts.")
    ];
    let index = VectorIndex::from_documents(
        documents,
        Arc::new(WordHashEmbedder),
        IndexSettings::default()
    ).await.expect("fixture index");

    Arc::new(
        PolicyAssistant::from_parts(
            Arc::new(index),
            Arc::new(CannedChatClient),
            Arc::new(PromptConfig::default()),
            3000
        )
    )
}

pub async fn app_state(api_key: Option<&str>) -> AppState {
    AppState::new(assistant().await, api_key.map(str::to_string))
}
