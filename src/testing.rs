//! Deterministic stand-ins for the LLM and embedding providers.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };

use crate::llm::chat::{ ChatClient, ChatStream, CompletionResponse };
use crate::llm::embedding::EmbeddingClient;
use crate::models::chat::ChatMessage;
use crate::rag::{ Document, IndexSettings, VectorIndex };

const DIMENSIONS: usize = 256;

pub fn doc(id: &str, text: &str) -> Document {
    Document { id: id.to_string(), source: id.to_string(), text: text.to_string() }
}

/// Bag-of-words embedding over hashed, lowercased words.
#[derive(Default)]
pub struct KeywordEmbedder {
    batch_calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn vectorize(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty()) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ (b as u32)).wrapping_mul(16777619));
            vector[(hash as usize) % DIMENSIONS] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingClient for KeywordEmbedder {
    async fn embed_batch(
        &self,
        texts: &[String]
    ) -> Result<Vec<Vec<f32>>, Box<dyn StdError + Send + Sync>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(
            texts
                .iter()
                .map(|t| Self::vectorize(t))
                .collect()
        )
    }
}

/// Chat client with canned output that records every request it receives.
///
/// `complete` answers with a pure function of the prompt, so identical
/// prompts always produce identical condensed questions.
pub struct ScriptedChatClient {
    answer: String,
    fail_after: Option<usize>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChatClient {
    pub fn new(answer: &str) -> Self {
        Self { answer: answer.to_string(), fail_after: None, requests: Mutex::new(Vec::new()) }
    }

    /// Streams `chunks` words of the answer and then yields an error.
    pub fn failing_after(answer: &str, chunks: usize) -> Self {
        Self { fail_after: Some(chunks), ..Self::new(answer) }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn condensed_for(prompt: &str) -> String {
        let checksum = prompt.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        format!("standalone question {:08x}", checksum)
    }

    pub fn answer_chunks(&self) -> Vec<String> {
        self.answer
            .split_inclusive(' ')
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage]
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let prompt = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(CompletionResponse { response: format!("  {}\n", Self::condensed_for(prompt)) })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage]
    ) -> Result<ChatStream, Box<dyn StdError + Send + Sync>> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let mut items: Vec<Result<String, Box<dyn StdError + Send + Sync>>> = self
            .answer_chunks()
            .into_iter()
            .map(Ok)
            .collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err("connection reset by provider".into()));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn get_model(&self) -> String {
        "scripted".to_string()
    }
}

pub async fn fixture_index() -> Arc<VectorIndex> {
    let docs = vec![
        doc("leave.md", "Leave policy: every employee receives twenty days of paid annual leave."),
        doc("remote.md", "Remote work is allowed two days per week with manager approval."),
        doc("expenses.md", "Expense claims must be filed within thirty days with receipts.")
    ];
    let index = VectorIndex::from_documents(
        docs,
        Arc::new(KeywordEmbedder::default()),
        IndexSettings::default()
    ).await.unwrap();
    Arc::new(index)
}
